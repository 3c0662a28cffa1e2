//! Configuration errors.

/// Errors raised while locating, parsing or validating configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Configuration file not found in {directory} (looked for {candidates:?})")]
    FileNotFound {
        directory: String,
        candidates: Vec<String>,
    },

    #[error("Failed to read configuration file {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Invalid YAML in {file}: {reason}")]
    InvalidYaml { file: String, reason: String },

    #[error("Invalid configuration value for {field}: {reason}")]
    Validation { field: String, reason: String },
}

impl ConfigurationError {
    pub fn file_read_error(path: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.into(),
            reason: error.to_string(),
        }
    }

    pub fn invalid_yaml(file: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::InvalidYaml {
            file: file.into(),
            reason: error.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

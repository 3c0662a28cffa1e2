//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles YAML file discovery,
//! environment detection and merging of per-environment override sections.

use super::error::{ConfigResult, ConfigurationError};
use super::CascadeConfig;
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_NAMES: [&str; 2] = ["cascade-config.yaml", "cascade-config.yml"];
const ENVIRONMENT_SECTIONS: [&str; 3] = ["development", "test", "production"];

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: CascadeConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Tests use this to avoid touching process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            max_in_flight = config.queue.max_in_flight,
            failure_threshold = config.circuit_breaker.failure_threshold,
            batch_base_size = config.batch.base_size,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: CascadeConfig, environment: &str) -> ConfigResult<ConfigManager> {
        config.validate()?;
        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        })
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the current environment from CASCADE_ENV, then APP_ENV
    pub fn detect_environment() -> String {
        env::var("CASCADE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("CASCADE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| config_directory.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| ConfigurationError::FileNotFound {
                directory: config_directory.display().to_string(),
                candidates: CONFIG_FILE_NAMES.iter().map(|s| s.to_string()).collect(),
            })
    }

    /// Read a configuration file, refusing anything that is not a small regular file
    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if !metadata.is_file() {
            return Err(ConfigurationError::file_read_error(
                path.display().to_string(),
                "not a regular file",
            ));
        }

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::file_read_error(
                path.display().to_string(),
                format!(
                    "file too large ({} bytes > {MAX_CONFIG_FILE_SIZE} byte limit)",
                    metadata.len()
                ),
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<CascadeConfig> {
        let config_file = Self::find_config_file(config_directory)?;
        let file_label = config_file.display().to_string();
        let yaml_content = Self::read_config_file_safely(&config_file)?;

        let mut yaml_data: YamlValue = serde_yaml::from_str(&yaml_content)
            .map_err(|e| ConfigurationError::invalid_yaml(&file_label, e))?;

        // An empty file parses as null; treat it as "all defaults"
        if yaml_data.is_null() {
            yaml_data = YamlValue::Mapping(Default::default());
        }

        if let Some(env_overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            debug!("Applying environment-specific overrides for: {}", environment);
            Self::merge_yaml_values(&mut yaml_data, env_overrides);
        }

        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for section in ENVIRONMENT_SECTIONS {
                map.remove(YamlValue::String(section.to_string()));
            }
        }

        serde_yaml::from_value(yaml_data).map_err(|e| {
            ConfigurationError::invalid_yaml(
                file_label,
                format!("Failed to deserialize configuration: {e}"),
            )
        })
    }

    /// Deep-merge `override_value` into `base`; non-mapping values replace outright
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing_value, value);
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(contents: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cascade-config.yaml"), contents).unwrap();
        dir
    }

    #[test]
    fn test_config_file_not_found() {
        let dir = TempDir::new().unwrap();
        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let dir = write_config("");
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.config(), &CascadeConfig::default());
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_yml_extension_is_discovered() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("cascade-config.yml"),
            "executor:\n  operation_timeout_ms: 1000\n",
        )
        .unwrap();
        let manager = ConfigManager::load_from_directory_with_env(
            Some(dir.path().to_path_buf()),
            "development",
        )
        .unwrap();
        assert_eq!(manager.config().executor.operation_timeout_ms, 1000);
    }

    #[test]
    fn test_environment_overrides_merge_deeply() {
        let dir = write_config(
            r#"
circuit_breaker:
  failure_threshold: 5
  reset_timeout_ms: 60000
batch:
  base_size: 20
test:
  circuit_breaker:
    reset_timeout_ms: 100
production:
  batch:
    base_size: 40
"#,
        );

        let test = ConfigManager::load_from_directory_with_env(
            Some(dir.path().to_path_buf()),
            "test",
        )
        .unwrap();
        assert_eq!(test.config().circuit_breaker.reset_timeout_ms, 100);
        assert_eq!(test.config().circuit_breaker.failure_threshold, 5);
        assert_eq!(test.config().batch.base_size, 20);

        let production = ConfigManager::load_from_directory_with_env(
            Some(dir.path().to_path_buf()),
            "production",
        )
        .unwrap();
        assert_eq!(production.config().batch.base_size, 40);
        assert_eq!(production.config().circuit_breaker.reset_timeout_ms, 60000);
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let dir = write_config("queue: [unterminated");
        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(result, Err(ConfigurationError::InvalidYaml { .. })));
    }

    #[test]
    fn test_loaded_config_is_validated() {
        let dir = write_config("queue:\n  max_in_flight: 0\n");
        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(result, Err(ConfigurationError::Validation { .. })));
    }

    #[test]
    fn test_merge_replaces_scalars() {
        let mut base: YamlValue = serde_yaml::from_str("a: 1\nb:\n  c: 2\n  d: 3\n").unwrap();
        let overrides: YamlValue = serde_yaml::from_str("b:\n  c: 20\ne: 5\n").unwrap();
        ConfigManager::merge_yaml_values(&mut base, overrides);

        let expected: YamlValue =
            serde_yaml::from_str("a: 1\nb:\n  c: 20\n  d: 3\ne: 5\n").unwrap();
        assert_eq!(base, expected);
    }
}

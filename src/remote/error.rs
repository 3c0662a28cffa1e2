//! Classified failure types surfaced by the executor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Closed failure taxonomy for remote operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request is malformed or conflicts with remote state
    Validation,
    /// Credentials missing, expired or lacking permission
    Auth,
    /// Target item does not exist
    NotFound,
    /// Remote quota exhausted
    RateLimited,
    /// Connection-level failure
    Network,
    /// Remote-side 5xx failure
    Server,
    /// Per-operation timeout elapsed
    Timeout,
    /// Rejected locally by an open circuit, no network attempt made
    CircuitOpen,
    /// Anything the classifier could not place
    Unknown,
}

impl ErrorKind {
    /// Whether another attempt could change the outcome.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::Network
                | ErrorKind::Server
                | ErrorKind::Timeout
                | ErrorKind::Unknown
        )
    }

    /// Failures that indicate the endpoint itself is unhealthy.
    pub fn counts_toward_circuit(self) -> bool {
        matches!(self, ErrorKind::Server | ErrorKind::Network | ErrorKind::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final, classified failure of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("operation {operation_id} failed with {kind} after {attempts} attempt(s): {message}")]
pub struct OperationError {
    pub operation_id: String,
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub retry_after: Option<Duration>,
    pub attempts: u32,
}

impl OperationError {
    pub fn new(operation_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            kind,
            message: message.into(),
            status: None,
            retry_after: None,
            attempts: 0,
        }
    }

    pub fn circuit_open(operation_id: impl Into<String>, endpoint: &str) -> Self {
        Self::new(
            operation_id,
            ErrorKind::CircuitOpen,
            format!("circuit breaker is open for {endpoint}"),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

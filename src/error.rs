//! Crate-level error type.
//!
//! Each subsystem owns its error; [`CascadeError`] wraps them for callers that
//! drive several subsystems through one `?` chain.

use crate::config::ConfigurationError;
use crate::execution::CheckpointError;
use crate::graph::GraphError;
use crate::propagation::PropagationError;
use crate::remote::OperationError;

#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Remote operation failed: {0}")]
    Operation(#[from] OperationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Propagation error: {0}")]
    Propagation(#[from] PropagationError),
}

pub type Result<T> = std::result::Result<T, CascadeError>;

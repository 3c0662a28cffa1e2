//! # Models
//!
//! Plain data types exchanged between the external parser, the graph analyzer and
//! the remote execution layer.

pub mod operation;
pub mod task;

pub use operation::{OperationCategory, OperationPriority};
pub use task::{Priority, TaskId, TaskNode, TaskRecord};

use crate::graph::GraphError;

/// Parse the upstream parser's JSON array into task records.
///
/// Ids must be integers; anything else (strings, floats, missing ids) is rejected
/// as a validation error instead of being coerced. Range checks (`id >= 1`) happen
/// when the graph is built.
pub fn parse_task_records(json: &str) -> Result<Vec<TaskRecord>, GraphError> {
    serde_json::from_str::<Vec<TaskRecord>>(json).map_err(|e| GraphError::Validation {
        task_id: None,
        reason: format!("malformed task records: {e}"),
    })
}

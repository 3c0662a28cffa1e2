//! Batch run checkpoints.
//!
//! The batch processor holds no durable state. Progress leaves the process only
//! through a caller-supplied [`CheckpointSink`], and a later run resumes by
//! filtering its input with [`Checkpoint::pending`].

use crate::remote::OperationError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Something the batch processor can identify across runs
pub trait BatchItem: Send + Sync {
    /// Stable identifier, recorded in checkpoints and results
    fn item_id(&self) -> String;
}

impl BatchItem for String {
    fn item_id(&self) -> String {
        self.clone()
    }
}

impl BatchItem for i64 {
    fn item_id(&self) -> String {
        self.to_string()
    }
}

/// An item that failed permanently within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub item_id: String,
    pub error: OperationError,
}

/// Progress of one batch run at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: Uuid,
    /// 1-based position of this checkpoint within the run
    pub sequence: u32,
    pub processed_count: usize,
    pub total_items: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedItem>,
    /// Batch size the run would use next
    pub next_batch_size: usize,
    pub created_at: DateTime<Utc>,
    /// Set on the checkpoint emitted when the run ends
    pub is_final: bool,
}

impl Checkpoint {
    /// Items from `items` that did not succeed in the checkpointed run.
    ///
    /// Failed and unprocessed items are both returned, in input order.
    pub fn pending<'a, I: BatchItem>(&self, items: &'a [I]) -> Vec<&'a I> {
        let done: HashSet<&str> = self.succeeded.iter().map(String::as_str).collect();
        items
            .iter()
            .filter(|item| !done.contains(item.item_id().as_str()))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint sink rejected checkpoint {sequence} of run {run_id}: {reason}")]
    Rejected {
        run_id: Uuid,
        sequence: u32,
        reason: String,
    },
}

/// Destination for checkpoints, supplied by the caller
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
}

/// Keeps every checkpoint in memory; useful for tests and short-lived runs
#[derive(Debug, Default)]
pub struct MemoryCheckpointSink {
    checkpoints: Mutex<Vec<Checkpoint>>,
}

impl MemoryCheckpointSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.lock().clone()
    }

    pub fn latest(&self) -> Option<Checkpoint> {
        self.checkpoints.lock().last().cloned()
    }
}

#[async_trait]
impl CheckpointSink for MemoryCheckpointSink {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.checkpoints.lock().push(checkpoint.clone());
        Ok(())
    }
}

/// Adapts a synchronous callback into a sink
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(&Checkpoint) -> Result<(), CheckpointError> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> std::fmt::Debug for CallbackSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> CheckpointSink for CallbackSink<F>
where
    F: Fn(&Checkpoint) -> Result<(), CheckpointError> + Send + Sync,
{
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        (self.callback)(checkpoint)
    }
}

//! # Execution
//!
//! Everything between "this remote operation needs to happen" and the network:
//! the priority queue and bounded dispatch, the resilient executor, and the
//! adaptive batch processor that drives the executor over many items.

pub mod batch;
pub mod checkpoint;
pub mod dispatch;
pub mod executor;
pub mod metrics;
pub mod priority_queue;

pub use batch::{AdaptiveBatchProcessor, BatchRunResult, BatchSuccess};
pub use checkpoint::{
    BatchItem, CallbackSink, Checkpoint, CheckpointError, CheckpointSink, FailedItem,
    MemoryCheckpointSink,
};
pub use dispatch::{DispatchQueue, DispatchSlot};
pub use executor::ResilientExecutor;
pub use metrics::{ExecutorMetrics, ExecutorMetricsSnapshot};
pub use priority_queue::PriorityRequestQueue;

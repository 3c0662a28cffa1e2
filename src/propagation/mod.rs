//! # Status Propagation
//!
//! Turns a [`DependencyGraph`](crate::graph::DependencyGraph) snapshot into
//! READY / BLOCKED label updates and applies them through the resilient
//! executor.
//!
//! Status is recomputed from dependency closed flags on every run, never
//! incremented in place, and every write replaces a task's full label set.
//! Running a plan and then planning again against the refreshed snapshot
//! yields no updates.
//!
//! ## Modes
//!
//! - **Webhook**: one task just closed; only the frontier it unblocks is
//!   evaluated.
//! - **Full scan**: every open task is evaluated; heals anything a missed
//!   webhook left behind.
//!
//! ```rust
//! use cascade_core::config::PropagationConfig;
//! use cascade_core::graph::DependencyGraph;
//! use cascade_core::models::TaskRecord;
//! use cascade_core::propagation::{StatusPropagationEngine, TaskStatus};
//!
//! let graph = DependencyGraph::build(vec![
//!     TaskRecord::new(1, []).closed(),
//!     TaskRecord::new(2, [1]).with_labels(["status: blocked"]),
//! ])
//! .unwrap();
//!
//! let engine = StatusPropagationEngine::new(&PropagationConfig::default());
//! let plan = engine.plan_webhook(&graph, 1);
//! assert_eq!(plan.updates.len(), 1);
//! assert_eq!(plan.updates[0].status, TaskStatus::Ready);
//! ```

mod engine;
mod status;

pub use engine::{
    LabelUpdate, LabelWriter, PropagationMode, PropagationPlan, StatusPropagationEngine,
};
pub use status::{compute_status, TaskStatus};

use crate::graph::GraphError;

#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    #[error("Failed to build dependency graph: {0}")]
    Graph(#[from] GraphError),
}

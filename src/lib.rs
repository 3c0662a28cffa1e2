#![allow(clippy::doc_markdown)] // Allow technical terms like GitHub, YAML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Cascade Core
//!
//! Dependency-graph analysis and resilient remote execution for issue-tracker
//! task cascades.
//!
//! ## Overview
//!
//! Tasks in an external tracker declare which other tasks they depend on. When a
//! task closes, the tasks waiting on it may become workable. Cascade Core builds
//! the dependency graph from a snapshot of the tracker, works out which tasks are
//! READY or BLOCKED, and writes the result back as labels while keeping the
//! tracker's rate limits and failure modes under control.
//!
//! ## Architecture
//!
//! Reads flow one way: tracker snapshot → [`models::TaskRecord`] →
//! [`graph::DependencyGraph`] → [`propagation::PropagationPlan`] → executor →
//! tracker. The analyzer and propagation engine are pure; they never touch the
//! network. Everything that does goes through [`execution::ResilientExecutor`],
//! which composes:
//!
//! - **Rate limit tracking** with throttling ahead of the remote's own limit
//! - **Circuit breaking** per endpoint
//! - **Categorised retries** with per-category jitter
//! - **Priority dispatch** across four tiers with starvation promotion and a
//!   bound on operations in flight
//!
//! [`execution::AdaptiveBatchProcessor`] drives the executor over long item lists,
//! resizing batches from error rate and quota usage and emitting checkpoints.
//!
//! ## Module Organization
//!
//! - [`models`] - Task records, graph nodes and operation enums
//! - [`graph`] - Dependency graph build and analysis
//! - [`propagation`] - READY / BLOCKED status and label planning
//! - [`remote`] - Remote contract types and error classification
//! - [`resilience`] - Circuit breaker, rate limit tracker, backoff
//! - [`execution`] - Priority queue, executor, batch processor, checkpoints
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//! - [`error`] - Crate-level error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cascade_core::config::CascadeConfig;
//! use cascade_core::graph::DependencyGraph;
//! use cascade_core::models::TaskRecord;
//! use cascade_core::propagation::StatusPropagationEngine;
//!
//! # fn main() -> cascade_core::Result<()> {
//! let config = CascadeConfig::default();
//! let graph = DependencyGraph::build(vec![
//!     TaskRecord::new(1, []).closed(),
//!     TaskRecord::new(2, [1]),
//!     TaskRecord::new(3, [2]),
//! ])?;
//!
//! let engine = StatusPropagationEngine::new(&config.propagation);
//! let plan = engine.plan_full_scan(&graph);
//! println!("{} label updates planned", plan.updates.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod graph;
pub mod logging;
pub mod models;
pub mod propagation;
pub mod remote;
pub mod resilience;

pub use config::{CascadeConfig, ConfigManager, ConfigurationError};
pub use error::{CascadeError, Result};
pub use execution::{AdaptiveBatchProcessor, BatchRunResult, Checkpoint, ResilientExecutor};
pub use graph::{DependencyGraph, GraphAnalysis, GraphError};
pub use models::{OperationPriority, Priority, TaskId, TaskRecord};
pub use propagation::{StatusPropagationEngine, TaskStatus};
pub use remote::{ErrorKind, OperationError, RemoteOperation};
pub use resilience::{CircuitBreaker, EndpointRegistry, RateLimitTracker};

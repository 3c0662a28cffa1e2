//! Planning and applying label updates.

use super::status::{compute_status, TaskStatus};
use super::PropagationError;
use crate::config::PropagationConfig;
use crate::execution::{AdaptiveBatchProcessor, BatchItem, BatchRunResult, ResilientExecutor};
use crate::graph::{DependencyGraph, GraphIssue};
use crate::logging::log_propagation_run;
use crate::models::{OperationCategory, Priority, TaskId, TaskNode, TaskRecord};
use crate::remote::{RemoteOperation, RemoteRejection, RemoteResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Which tasks a run evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PropagationMode {
    /// Only the frontier unblocked by one just-closed task
    Webhook { closed_task: TaskId },
    /// Every open task in the snapshot
    FullScan,
}

impl PropagationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationMode::Webhook { .. } => "webhook",
            PropagationMode::FullScan => "full_scan",
        }
    }
}

impl fmt::Display for PropagationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationMode::Webhook { closed_task } => write!(f, "webhook({closed_task})"),
            PropagationMode::FullScan => f.write_str("full_scan"),
        }
    }
}

/// Replace the whole label set of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelUpdate {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub priority: Priority,
    pub previous_labels: BTreeSet<String>,
    pub labels: BTreeSet<String>,
}

impl LabelUpdate {
    pub fn operation_id(&self) -> String {
        format!("labels:{}", self.task_id)
    }
}

impl BatchItem for LabelUpdate {
    fn item_id(&self) -> String {
        self.operation_id()
    }
}

/// Result of evaluating a snapshot; nothing has touched the network yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationPlan {
    pub mode: PropagationMode,
    /// Tasks whose status was recomputed
    pub evaluated: usize,
    /// One entry per task whose labels are out of date, ascending by id
    pub updates: Vec<LabelUpdate>,
    /// Graph issues on evaluated tasks
    pub issues: Vec<GraphIssue>,
}

impl PropagationPlan {
    fn empty(mode: PropagationMode) -> Self {
        Self {
            mode,
            evaluated: 0,
            updates: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// The write side of the tracker: set a task's labels to exactly `labels`
#[async_trait]
pub trait LabelWriter: Send + Sync + 'static {
    async fn replace_labels(
        &self,
        task_id: TaskId,
        labels: &BTreeSet<String>,
    ) -> Result<RemoteResponse<()>, RemoteRejection>;
}

/// Derives READY/BLOCKED labels from a graph snapshot
#[derive(Debug, Clone)]
pub struct StatusPropagationEngine {
    config: PropagationConfig,
}

impl StatusPropagationEngine {
    pub fn new(config: &PropagationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Whether `label` is owned by propagation and gets replaced on every run
    pub fn is_managed_label(&self, label: &str) -> bool {
        label == self.config.ready_label
            || label == self.config.blocked_label
            || (!self.config.managed_label_prefix.is_empty()
                && label.starts_with(&self.config.managed_label_prefix))
    }

    pub fn status_label(&self, status: TaskStatus) -> &str {
        match status {
            TaskStatus::Ready => &self.config.ready_label,
            TaskStatus::Blocked(_) => &self.config.blocked_label,
        }
    }

    /// Current labels with managed labels swapped for the one matching `status`
    pub fn desired_labels(&self, node: &TaskNode, status: TaskStatus) -> BTreeSet<String> {
        let mut labels: BTreeSet<String> = node
            .labels
            .iter()
            .filter(|label| !self.is_managed_label(label))
            .cloned()
            .collect();
        labels.insert(self.status_label(status).to_string());
        labels
    }

    /// Plan for one just-closed task.
    ///
    /// Only the frontier from [`DependencyGraph::find_unblockable`] is evaluated,
    /// with `closed_task` treated as closed whether or not the snapshot says so.
    #[instrument(skip(self, graph), fields(tasks = graph.len()))]
    pub fn plan_webhook(&self, graph: &DependencyGraph, closed_task: TaskId) -> PropagationPlan {
        let mode = PropagationMode::Webhook { closed_task };
        if !graph.contains(closed_task) {
            warn!(
                task_id = closed_task,
                "⚠️ Closed task not present in snapshot, nothing to propagate"
            );
            log_propagation_run(mode.as_str(), 0, 0, 0);
            return PropagationPlan::empty(mode);
        }

        let frontier = graph.find_unblockable(&[closed_task]);
        let mut plan = PropagationPlan::empty(mode);

        for id in frontier {
            let Some(node) = graph.get(id) else {
                continue;
            };
            let open = node
                .dependencies
                .iter()
                .filter(|d| **d != closed_task && !graph.is_closed(**d))
                .count();
            plan.evaluated += 1;
            plan.issues.extend(graph.issues_for(id).into_iter().cloned());
            self.push_if_changed(&mut plan, node, TaskStatus::from_open_count(open));
        }

        self.finish(plan)
    }

    /// Plan recomputing every open task; heals labels missed by webhook runs
    #[instrument(skip(self, graph), fields(tasks = graph.len()))]
    pub fn plan_full_scan(&self, graph: &DependencyGraph) -> PropagationPlan {
        let mut plan = PropagationPlan::empty(PropagationMode::FullScan);

        for node in graph.nodes().filter(|node| node.is_open()) {
            let Some(status) = compute_status(graph, node.id) else {
                continue;
            };
            plan.evaluated += 1;
            plan.issues
                .extend(graph.issues_for(node.id).into_iter().cloned());
            self.push_if_changed(&mut plan, node, status);
        }

        self.finish(plan)
    }

    /// Build the graph from raw records and plan a full scan over it
    pub fn plan_full_scan_from_records(
        &self,
        records: Vec<TaskRecord>,
    ) -> Result<PropagationPlan, PropagationError> {
        let graph = DependencyGraph::build(records)?;
        Ok(self.plan_full_scan(&graph))
    }

    fn push_if_changed(&self, plan: &mut PropagationPlan, node: &TaskNode, status: TaskStatus) {
        let labels = self.desired_labels(node, status);
        if labels == node.labels {
            debug!(task_id = node.id, status = %status, "Labels already current");
            return;
        }
        plan.updates.push(LabelUpdate {
            task_id: node.id,
            status,
            priority: node.priority,
            previous_labels: node.labels.clone(),
            labels,
        });
    }

    fn finish(&self, plan: PropagationPlan) -> PropagationPlan {
        for issue in &plan.issues {
            warn!(task_id = issue.task_id(), issue = ?issue, "⚠️ Graph issue on evaluated task");
        }
        log_propagation_run(
            plan.mode.as_str(),
            plan.evaluated,
            plan.updates.len(),
            plan.issues.len(),
        );
        plan
    }

    /// One label-replacement operation per update
    pub fn operations(
        &self,
        plan: &PropagationPlan,
        writer: Arc<dyn LabelWriter>,
    ) -> Vec<RemoteOperation<()>> {
        plan.updates
            .iter()
            .map(|update| label_operation(update, Arc::clone(&writer)))
            .collect()
    }

    /// Run every update in `plan` through `batch` and `executor`.
    ///
    /// Failures are reported in the result, never raised.
    #[instrument(skip_all, fields(mode = plan.mode.as_str(), updates = plan.updates.len()))]
    pub async fn apply(
        &self,
        plan: &PropagationPlan,
        writer: Arc<dyn LabelWriter>,
        executor: &ResilientExecutor,
        batch: &AdaptiveBatchProcessor,
    ) -> BatchRunResult<()> {
        batch
            .process(&plan.updates, |update| {
                let operation = label_operation(update, Arc::clone(&writer));
                async move { executor.execute(&operation).await }
            })
            .await
    }
}

fn label_operation(update: &LabelUpdate, writer: Arc<dyn LabelWriter>) -> RemoteOperation<()> {
    let task_id = update.task_id;
    let labels = update.labels.clone();
    RemoteOperation::new(
        update.operation_id(),
        OperationCategory::Update,
        update.priority.into(),
        move || {
            let writer = Arc::clone(&writer);
            let labels = labels.clone();
            async move { writer.replace_labels(task_id, &labels).await }
        },
    )
}

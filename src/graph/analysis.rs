//! One-call summary of a graph: readiness, cycles, issues and critical path.

use super::{CriticalPath, DependencyGraph, GraphIssue};
use crate::models::TaskId;
use serde::Serialize;
use tracing::info;

/// Combined report for one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphAnalysis {
    pub total_tasks: usize,
    pub open_tasks: usize,
    pub closed_tasks: usize,

    /// Open tasks with zero open dependencies
    pub ready: Vec<TaskId>,

    /// Open tasks with their open dependency count
    pub blocked: Vec<(TaskId, usize)>,

    pub cycles: Vec<Vec<TaskId>>,
    pub unresolvable: Vec<TaskId>,
    pub issues: Vec<GraphIssue>,
    pub critical_path: CriticalPath,
    pub remaining_critical_path: CriticalPath,
    pub level_count: usize,
}

impl DependencyGraph {
    /// Compute every derived view in one pass over the snapshot.
    pub fn analyze(&self) -> GraphAnalysis {
        let mut ready = Vec::new();
        let mut blocked = Vec::new();
        let mut closed_tasks = 0;

        for node in self.nodes() {
            if node.closed {
                closed_tasks += 1;
                continue;
            }
            match self.open_dependency_count(node.id).unwrap_or(0) {
                0 => ready.push(node.id),
                n => blocked.push((node.id, n)),
            }
        }

        let order = self.resolution_order();
        let analysis = GraphAnalysis {
            total_tasks: self.len(),
            open_tasks: self.len() - closed_tasks,
            closed_tasks,
            ready,
            blocked,
            unresolvable: order.unresolvable(),
            cycles: order.cycles,
            issues: self.issues().to_vec(),
            critical_path: self.critical_path(),
            remaining_critical_path: self.remaining_critical_path(),
            level_count: self.dependency_levels().len(),
        };

        info!(
            total = analysis.total_tasks,
            open = analysis.open_tasks,
            ready = analysis.ready.len(),
            blocked = analysis.blocked.len(),
            cycles = analysis.cycles.len(),
            issues = analysis.issues.len(),
            critical_path_len = analysis.critical_path.len(),
            "Dependency graph analyzed"
        );

        analysis
    }
}

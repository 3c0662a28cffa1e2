//! Per-task readiness state.

use crate::graph::DependencyGraph;
use crate::models::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Readiness of an open task, recomputed from dependency closed flags on every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Zero open dependencies
    Ready,
    /// This many dependencies are still open (or missing)
    Blocked(usize),
}

impl TaskStatus {
    pub fn from_open_count(open_dependencies: usize) -> Self {
        if open_dependencies == 0 {
            TaskStatus::Ready
        } else {
            TaskStatus::Blocked(open_dependencies)
        }
    }

    pub fn is_ready(self) -> bool {
        self == TaskStatus::Ready
    }

    pub fn open_dependencies(self) -> usize {
        match self {
            TaskStatus::Ready => 0,
            TaskStatus::Blocked(count) => count,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Ready => f.write_str("ready"),
            TaskStatus::Blocked(count) => write!(f, "blocked({count})"),
        }
    }
}

/// Status of `id` in `graph`; `None` for unknown or closed tasks
pub fn compute_status(graph: &DependencyGraph, id: TaskId) -> Option<TaskStatus> {
    let node = graph.get(id)?;
    if node.closed {
        return None;
    }
    graph
        .open_dependency_count(id)
        .map(TaskStatus::from_open_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskRecord;

    #[test]
    fn test_status_counts_open_and_missing_dependencies() {
        let graph = DependencyGraph::build(vec![
            TaskRecord::new(1, []).closed(),
            TaskRecord::new(2, []),
            TaskRecord::new(3, [1]),
            TaskRecord::new(4, [1, 2]),
            TaskRecord::new(5, [2, 99]),
        ])
        .unwrap();

        assert_eq!(compute_status(&graph, 1), None);
        assert_eq!(compute_status(&graph, 2), Some(TaskStatus::Ready));
        assert_eq!(compute_status(&graph, 3), Some(TaskStatus::Ready));
        assert_eq!(compute_status(&graph, 4), Some(TaskStatus::Blocked(1)));
        assert_eq!(compute_status(&graph, 5), Some(TaskStatus::Blocked(2)));
        assert_eq!(compute_status(&graph, 42), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskStatus::Ready.to_string(), "ready");
        assert_eq!(TaskStatus::Blocked(3).to_string(), "blocked(3)");
        assert_eq!(TaskStatus::from_open_count(0), TaskStatus::Ready);
        assert_eq!(TaskStatus::Blocked(2).open_dependencies(), 2);
    }
}

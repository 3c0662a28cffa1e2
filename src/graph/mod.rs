//! # Dependency Graph Analyzer
//!
//! In-memory dependency graph rebuilt from scratch for every scan of the tracker.
//!
//! ## Overview
//!
//! The graph is built from the parser's [`TaskRecord`]s in two passes: the first
//! validates and indexes every record, the second inverts `dependencies` into
//! `dependents`. References to ids that are not part of the snapshot are kept as
//! dangling edges and reported through [`DependencyGraph::issues`], so a missing
//! dependency is observable rather than silently dropped.
//!
//! ## Derived Views
//!
//! - [`DependencyGraph::detect_cycles`] - iterative three-colour DFS
//! - [`DependencyGraph::resolution_order`] - priority-aware topological order
//! - [`DependencyGraph::find_unblockable`] - frontier that becomes ready when tasks close
//! - [`DependencyGraph::critical_path`] - longest dependency chain
//! - [`DependencyGraph::dependency_levels`] - parallelizable layers
//! - [`DependencyGraph::analyze`] - combined report
//!
//! Every traversal uses explicit stacks or worklists so stack usage does not grow
//! with graph depth.
//!
//! ## Usage
//!
//! ```rust
//! use cascade_core::graph::DependencyGraph;
//! use cascade_core::models::TaskRecord;
//!
//! let graph = DependencyGraph::build(vec![
//!     TaskRecord::new(1, []).closed(),
//!     TaskRecord::new(2, [1]),
//!     TaskRecord::new(3, [2]),
//!     TaskRecord::new(4, [1]),
//! ])
//! .unwrap();
//!
//! assert_eq!(graph.find_unblockable(&[1]), vec![2, 4]);
//! ```

mod analysis;
mod critical_path;
mod cycles;
mod ordering;
mod unblock;

pub use analysis::GraphAnalysis;
pub use critical_path::CriticalPath;
pub use ordering::ResolutionOrder;

use crate::models::{TaskId, TaskNode, TaskRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Errors raised while building a graph from parser output
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A record failed validation at the graph-build boundary
    #[error("Invalid task record: {reason}")]
    Validation {
        task_id: Option<TaskId>,
        reason: String,
    },

    /// The same id appeared twice in one snapshot
    #[error("Duplicate task id {0}")]
    DuplicateTask(TaskId),
}

/// Non-fatal problems attached to individual nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphIssue {
    /// The task lists itself as a dependency. The edge is kept.
    SelfDependency { task_id: TaskId },

    /// The task depends on an id that is not part of the snapshot
    MissingDependency { task_id: TaskId, missing: TaskId },
}

impl GraphIssue {
    pub fn task_id(&self) -> TaskId {
        match self {
            GraphIssue::SelfDependency { task_id } => *task_id,
            GraphIssue::MissingDependency { task_id, .. } => *task_id,
        }
    }
}

/// Dependency graph for one scan
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<TaskId, TaskNode>,
    issues: Vec<GraphIssue>,
}

impl DependencyGraph {
    /// Build the graph from parser records in O(n + e).
    pub fn build<I>(records: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = TaskRecord>,
    {
        let mut nodes = BTreeMap::new();

        for record in records {
            validate_record(&record)?;
            let id = record.id;
            if nodes.insert(id, TaskNode::from_record(record)).is_some() {
                return Err(GraphError::DuplicateTask(id));
            }
        }

        let mut issues = Vec::new();
        let mut inverse: Vec<(TaskId, TaskId)> = Vec::new();

        for node in nodes.values() {
            for &dependency in &node.dependencies {
                if dependency == node.id {
                    issues.push(GraphIssue::SelfDependency { task_id: node.id });
                }
                if nodes.contains_key(&dependency) {
                    inverse.push((dependency, node.id));
                } else {
                    issues.push(GraphIssue::MissingDependency {
                        task_id: node.id,
                        missing: dependency,
                    });
                }
            }
        }

        for (dependency, dependent) in inverse {
            if let Some(node) = nodes.get_mut(&dependency) {
                node.dependents.insert(dependent);
            }
        }

        for issue in &issues {
            warn!(task_id = issue.task_id(), issue = ?issue, "Dependency graph issue");
        }

        debug!(
            node_count = nodes.len(),
            issue_count = issues.len(),
            "Dependency graph built"
        );

        Ok(Self { nodes, issues })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    /// Nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn issues(&self) -> &[GraphIssue] {
        &self.issues
    }

    /// Issues attached to a single task
    pub fn issues_for(&self, id: TaskId) -> Vec<&GraphIssue> {
        self.issues.iter().filter(|i| i.task_id() == id).collect()
    }

    /// `(task, missing dependency)` pairs
    pub fn dangling_references(&self) -> Vec<(TaskId, TaskId)> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                GraphIssue::MissingDependency { task_id, missing } => Some((*task_id, *missing)),
                GraphIssue::SelfDependency { .. } => None,
            })
            .collect()
    }

    /// A dependency counts as satisfied only when it is known and closed.
    pub fn is_closed(&self, id: TaskId) -> bool {
        self.nodes.get(&id).is_some_and(|node| node.closed)
    }

    /// Number of dependencies of `id` that are not closed. Missing dependencies
    /// count as open. Returns `None` for unknown ids.
    pub fn open_dependency_count(&self, id: TaskId) -> Option<usize> {
        let node = self.nodes.get(&id)?;
        Some(
            node.dependencies
                .iter()
                .filter(|dependency| !self.is_closed(**dependency))
                .count(),
        )
    }

    /// Dense index view used by the traversal algorithms.
    ///
    /// Only edges between known nodes are present.
    pub(crate) fn indexed(&self) -> IndexedGraph {
        let ids: Vec<TaskId> = self.nodes.keys().copied().collect();
        let index: HashMap<TaskId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut dependencies = Vec::with_capacity(ids.len());
        let mut dependents = Vec::with_capacity(ids.len());
        for node in self.nodes.values() {
            dependencies.push(
                node.dependencies
                    .iter()
                    .filter_map(|d| index.get(d).copied())
                    .collect::<Vec<_>>(),
            );
            dependents.push(
                node.dependents
                    .iter()
                    .filter_map(|d| index.get(d).copied())
                    .collect::<Vec<_>>(),
            );
        }

        IndexedGraph {
            ids,
            index,
            dependencies,
            dependents,
        }
    }
}

/// Adjacency lists over dense indices, in ascending id order
pub(crate) struct IndexedGraph {
    pub ids: Vec<TaskId>,
    pub index: HashMap<TaskId, usize>,
    pub dependencies: Vec<Vec<usize>>,
    pub dependents: Vec<Vec<usize>>,
}

impl IndexedGraph {
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

fn validate_record(record: &TaskRecord) -> Result<(), GraphError> {
    if record.id < 1 {
        return Err(GraphError::Validation {
            task_id: Some(record.id),
            reason: format!("task id must be >= 1, got {}", record.id),
        });
    }
    if let Some(bad) = record.dependencies.iter().find(|d| **d < 1) {
        return Err(GraphError::Validation {
            task_id: Some(record.id),
            reason: format!(
                "task {} has invalid dependency id {bad} (must be >= 1)",
                record.id
            ),
        });
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::records;
    use super::*;

    #[test]
    fn test_build_inverts_dependencies() {
        let graph = DependencyGraph::build(records(&[(1, &[]), (2, &[1]), (3, &[1, 2])])).unwrap();

        let one = graph.get(1).unwrap();
        assert_eq!(one.dependents.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
        let two = graph.get(2).unwrap();
        assert_eq!(two.dependents.iter().copied().collect::<Vec<_>>(), vec![3]);
        assert!(graph.get(3).unwrap().dependents.is_empty());
        assert!(graph.issues().is_empty());
    }

    #[test]
    fn test_dependents_is_exact_inverse() {
        let graph =
            DependencyGraph::build(records(&[(1, &[]), (2, &[1]), (3, &[2]), (4, &[1, 3])]))
                .unwrap();
        for node in graph.nodes() {
            for other in graph.nodes() {
                assert_eq!(
                    node.dependents.contains(&other.id),
                    other.dependencies.contains(&node.id)
                );
            }
        }
    }

    #[test]
    fn test_missing_dependency_is_recorded() {
        let graph = DependencyGraph::build(records(&[(1, &[99]), (2, &[1])])).unwrap();
        assert_eq!(graph.dangling_references(), vec![(1, 99)]);
        assert_eq!(
            graph.issues_for(1),
            vec![&GraphIssue::MissingDependency {
                task_id: 1,
                missing: 99
            }]
        );
        // The dangling edge stays on the node
        assert!(graph.get(1).unwrap().dependencies.contains(&99));
        assert_eq!(graph.open_dependency_count(1), Some(1));
    }

    #[test]
    fn test_self_dependency_is_flagged_not_dropped() {
        let graph = DependencyGraph::build(records(&[(5, &[5])])).unwrap();
        assert_eq!(graph.issues(), &[GraphIssue::SelfDependency { task_id: 5 }]);
        assert!(graph.get(5).unwrap().dependencies.contains(&5));
        assert!(graph.get(5).unwrap().dependents.contains(&5));
    }

    #[test]
    fn test_rejects_non_positive_ids() {
        let err = DependencyGraph::build(records(&[(0, &[])])).unwrap_err();
        assert!(matches!(err, GraphError::Validation { task_id: Some(0), .. }));

        let err = DependencyGraph::build(records(&[(2, &[-1])])).unwrap_err();
        assert!(matches!(err, GraphError::Validation { task_id: Some(2), .. }));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = DependencyGraph::build(records(&[(1, &[]), (1, &[])])).unwrap_err();
        assert_eq!(err, GraphError::DuplicateTask(1));
    }

    #[test]
    fn test_open_dependency_count_respects_closed_flags() {
        let mut input = records(&[(1, &[]), (2, &[]), (3, &[1, 2])]);
        input[0].closed = true;
        let graph = DependencyGraph::build(input).unwrap();
        assert_eq!(graph.open_dependency_count(3), Some(1));
        assert_eq!(graph.open_dependency_count(1), Some(0));
        assert_eq!(graph.open_dependency_count(42), None);
    }
}

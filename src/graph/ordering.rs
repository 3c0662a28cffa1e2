//! Priority-aware topological ordering and dependency levels.

use super::cycles::{cyclic_members, find_cycles};
use super::{DependencyGraph, IndexedGraph};
use crate::models::{Priority, TaskId};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Result of [`DependencyGraph::resolution_order`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResolutionOrder {
    /// Every orderable id, each after all of its known dependencies
    pub order: Vec<TaskId>,

    /// Ids lying on a cycle
    pub cyclic: Vec<TaskId>,

    /// Ids that are not cyclic themselves but depend (transitively) on a cycle
    pub blocked_by_cycle: Vec<TaskId>,

    /// Cycles as reported by [`DependencyGraph::detect_cycles`]
    pub cycles: Vec<Vec<TaskId>>,
}

impl ResolutionOrder {
    /// All ids excluded from `order`, ascending
    pub fn unresolvable(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .cyclic
            .iter()
            .chain(self.blocked_by_cycle.iter())
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_complete(&self) -> bool {
        self.cyclic.is_empty() && self.blocked_by_cycle.is_empty()
    }
}

/// Ready-set entry: higher priority first, then lower id.
#[derive(Debug, PartialEq, Eq)]
struct ReadyKey {
    priority: Priority,
    id: TaskId,
    index: usize,
}

impl Ord for ReadyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for ReadyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl DependencyGraph {
    /// Topological order of the graph.
    ///
    /// Among nodes with no unresolved dependencies, the highest priority goes first
    /// and equal priorities go by ascending id. Cyclic nodes, and nodes that can
    /// only be reached through them, are excluded and reported separately while
    /// the rest still gets an order. Dangling dependencies are ignored here.
    pub fn resolution_order(&self) -> ResolutionOrder {
        let graph = self.indexed();
        let cyclic = cyclic_members(&graph);
        let order = self.kahn_order(&graph, &cyclic);

        let mut placed = vec![false; graph.len()];
        for index in &order {
            placed[*index] = true;
        }

        let mut result = ResolutionOrder {
            order: order.iter().map(|i| graph.ids[*i]).collect(),
            cycles: if cyclic.iter().any(|c| *c) {
                find_cycles(&graph)
            } else {
                Vec::new()
            },
            ..ResolutionOrder::default()
        };

        for (index, id) in graph.ids.iter().enumerate() {
            if placed[index] {
                continue;
            }
            if cyclic[index] {
                result.cyclic.push(*id);
            } else {
                result.blocked_by_cycle.push(*id);
            }
        }

        debug!(
            ordered = result.order.len(),
            cyclic = result.cyclic.len(),
            blocked_by_cycle = result.blocked_by_cycle.len(),
            "Resolution order computed"
        );

        result
    }

    /// Group the orderable part of the graph into levels: level 0 has no known
    /// dependencies, level k depends on something at level k-1. Tasks within a
    /// level are independent of each other. Ids are ascending within a level.
    pub fn dependency_levels(&self) -> Vec<Vec<TaskId>> {
        let graph = self.indexed();
        let cyclic = cyclic_members(&graph);
        let order = self.kahn_order(&graph, &cyclic);

        let mut level = vec![0usize; graph.len()];
        let mut levels: Vec<Vec<TaskId>> = Vec::new();
        for &index in &order {
            let depth = graph.dependencies[index]
                .iter()
                .map(|d| level[*d] + 1)
                .max()
                .unwrap_or(0);
            level[index] = depth;
            if levels.len() <= depth {
                levels.resize_with(depth + 1, Vec::new);
            }
            levels[depth].push(graph.ids[index]);
        }

        for ids in &mut levels {
            ids.sort_unstable();
        }
        levels
    }

    /// Kahn's algorithm over non-cyclic nodes with the priority tie-break.
    /// Returns dense indices.
    pub(crate) fn kahn_order(&self, graph: &IndexedGraph, cyclic: &[bool]) -> Vec<usize> {
        let n = graph.len();
        let mut unresolved: Vec<usize> = graph.dependencies.iter().map(Vec::len).collect();
        let mut ready = BinaryHeap::new();

        for index in 0..n {
            if !cyclic[index] && unresolved[index] == 0 {
                ready.push(self.ready_key(graph, index));
            }
        }

        let mut order = Vec::with_capacity(n);
        while let Some(key) = ready.pop() {
            order.push(key.index);
            for &dependent in &graph.dependents[key.index] {
                if cyclic[dependent] {
                    continue;
                }
                unresolved[dependent] = unresolved[dependent].saturating_sub(1);
                if unresolved[dependent] == 0 {
                    ready.push(self.ready_key(graph, dependent));
                }
            }
        }

        order
    }

    fn ready_key(&self, graph: &IndexedGraph, index: usize) -> ReadyKey {
        let id = graph.ids[index];
        let priority = self
            .get(id)
            .map(|node| node.priority)
            .unwrap_or_default();
        ReadyKey {
            priority,
            id,
            index,
        }
    }
}

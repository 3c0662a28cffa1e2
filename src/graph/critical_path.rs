//! Longest dependency chain over the acyclic part of the graph.

use super::cycles::cyclic_members;
use super::DependencyGraph;
use crate::models::{TaskId, TaskNode};
use serde::Serialize;

/// Longest chain of dependent tasks, root first
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CriticalPath {
    pub tasks: Vec<TaskId>,
    pub priority_sum: u32,
}

impl CriticalPath {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Best {
    length: usize,
    priority_sum: u32,
    predecessor: Option<usize>,
}

impl DependencyGraph {
    /// Longest path by node count, ties broken by the larger priority sum and
    /// then by the smaller end id. Cyclic nodes and nodes behind them are
    /// excluded, so the result is best-effort when cycles exist.
    pub fn critical_path(&self) -> CriticalPath {
        self.longest_path(|_| true)
    }

    /// Critical path restricted to open tasks: the chain that still has to be
    /// worked through before the whole graph can close.
    pub fn remaining_critical_path(&self) -> CriticalPath {
        self.longest_path(TaskNode::is_open)
    }

    fn longest_path<F>(&self, include: F) -> CriticalPath
    where
        F: Fn(&TaskNode) -> bool,
    {
        let graph = self.indexed();
        let cyclic = cyclic_members(&graph);
        let order = self.kahn_order(&graph, &cyclic);

        let included: Vec<bool> = graph
            .ids
            .iter()
            .map(|id| self.get(*id).is_some_and(&include))
            .collect();
        let weight = |index: usize| -> u32 {
            self.get(graph.ids[index])
                .map(|node| node.priority.weight())
                .unwrap_or(0)
        };

        let mut best: Vec<Option<Best>> = vec![None; graph.len()];
        let mut end: Option<usize> = None;

        for &index in &order {
            if !included[index] {
                continue;
            }

            let mut current = Best {
                length: 1,
                priority_sum: weight(index),
                predecessor: None,
            };
            for &dependency in &graph.dependencies[index] {
                let Some(candidate) = best[dependency] else {
                    continue;
                };
                let length = candidate.length + 1;
                let priority_sum = candidate.priority_sum + weight(index);
                let better = (length, priority_sum) > (current.length, current.priority_sum)
                    || ((length, priority_sum) == (current.length, current.priority_sum)
                        && current
                            .predecessor
                            .is_some_and(|p| graph.ids[dependency] < graph.ids[p]));
                if better {
                    current = Best {
                        length,
                        priority_sum,
                        predecessor: Some(dependency),
                    };
                }
            }
            best[index] = Some(current);

            let replace = match end.and_then(|e| best[e].map(|b| (e, b))) {
                None => true,
                Some((e, b)) => {
                    (current.length, current.priority_sum) > (b.length, b.priority_sum)
                        || ((current.length, current.priority_sum)
                            == (b.length, b.priority_sum)
                            && graph.ids[index] < graph.ids[e])
                }
            };
            if replace {
                end = Some(index);
            }
        }

        let Some(end) = end else {
            return CriticalPath::default();
        };

        let priority_sum = best[end].map(|b| b.priority_sum).unwrap_or(0);
        let mut tasks = Vec::new();
        let mut cursor = Some(end);
        while let Some(index) = cursor {
            tasks.push(graph.ids[index]);
            cursor = best[index].and_then(|b| b.predecessor);
        }
        tasks.reverse();

        CriticalPath {
            tasks,
            priority_sum,
        }
    }
}

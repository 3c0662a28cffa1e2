//! Cycle detection and cyclic-membership analysis.

use super::{DependencyGraph, IndexedGraph};
use crate::models::TaskId;
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InStack,
    Done,
}

impl DependencyGraph {
    /// Report cycles along `dependencies` edges.
    ///
    /// Iterative DFS with three-state marking. Each back-edge to an in-stack node
    /// yields one cycle: the stack segment from the back-edge target down to the
    /// current node, so every consecutive pair is a dependency edge and the last
    /// node depends on the first. Returns an empty list iff the graph is acyclic.
    pub fn detect_cycles(&self) -> Vec<Vec<TaskId>> {
        let graph = self.indexed();
        let cycles = find_cycles(&graph);
        for cycle in &cycles {
            warn!(cycle = ?cycle, "Dependency cycle detected");
        }
        cycles
    }

    /// Ids that lie on at least one cycle (members of a strongly connected
    /// component with more than one node, or with a self edge).
    pub fn cyclic_ids(&self) -> BTreeSet<TaskId> {
        let graph = self.indexed();
        cyclic_members(&graph)
            .into_iter()
            .enumerate()
            .filter(|(_, cyclic)| *cyclic)
            .map(|(i, _)| graph.ids[i])
            .collect()
    }
}

pub(crate) fn find_cycles(graph: &IndexedGraph) -> Vec<Vec<TaskId>> {
    let n = graph.len();
    let mut marks = vec![Mark::Unvisited; n];
    // Position of each in-stack node on the DFS stack
    let mut stack_pos = vec![usize::MAX; n];
    let mut cycles = Vec::new();

    for start in 0..n {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::InStack;
        stack_pos[start] = 0;

        while let Some(frame) = stack.last_mut() {
            let (node, next_edge) = *frame;
            if next_edge < graph.dependencies[node].len() {
                frame.1 += 1;
                let child = graph.dependencies[node][next_edge];
                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::InStack;
                        stack_pos[child] = stack.len();
                        stack.push((child, 0));
                    }
                    Mark::InStack => {
                        let from = stack_pos[child];
                        let cycle = stack[from..]
                            .iter()
                            .map(|(member, _)| graph.ids[*member])
                            .collect();
                        cycles.push(cycle);
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack_pos[node] = usize::MAX;
                stack.pop();
            }
        }
    }

    cycles
}

/// Iterative Tarjan SCC; `result[i]` is true when node `i` is on a cycle.
pub(crate) fn cyclic_members(graph: &IndexedGraph) -> Vec<bool> {
    let n = graph.len();
    let mut cyclic = vec![false; n];
    let mut indices: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut component_stack: Vec<usize> = Vec::new();
    let mut counter = 0usize;

    for root in 0..n {
        if indices[root].is_some() {
            continue;
        }

        let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];
        indices[root] = Some(counter);
        lowlink[root] = counter;
        counter += 1;
        component_stack.push(root);
        on_stack[root] = true;

        while let Some(frame) = call_stack.last_mut() {
            let (node, next_edge) = *frame;
            if next_edge < graph.dependencies[node].len() {
                frame.1 += 1;
                let child = graph.dependencies[node][next_edge];
                match indices[child] {
                    None => {
                        indices[child] = Some(counter);
                        lowlink[child] = counter;
                        counter += 1;
                        component_stack.push(child);
                        on_stack[child] = true;
                        call_stack.push((child, 0));
                    }
                    Some(child_index) if on_stack[child] => {
                        lowlink[node] = lowlink[node].min(child_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }

            if Some(lowlink[node]) == indices[node] {
                let mut component = Vec::new();
                while let Some(member) = component_stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                let self_loop = graph.dependencies[node].contains(&node);
                if component.len() > 1 || self_loop {
                    for member in component {
                        cyclic[member] = true;
                    }
                }
            }
        }
    }

    cyclic
}

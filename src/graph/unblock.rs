//! Ready-frontier computation for tasks being closed.

use super::DependencyGraph;
use crate::models::TaskId;
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::debug;

impl DependencyGraph {
    /// Open tasks that become fully unblocked by closing `closing`.
    ///
    /// A task qualifies when every dependency is closed or in `closing`, and it
    /// was not already satisfied without `closing`. Works whether or not the
    /// snapshot already marks the closing tasks as closed.
    ///
    /// Only direct dependents of a closing task can flip, so the worklist starts
    /// from `closing` and walks one level of `dependents`; the cost is bounded by
    /// the affected subgraph, never the whole graph. Result is ascending.
    pub fn find_unblockable(&self, closing: &[TaskId]) -> Vec<TaskId> {
        let closing_set: HashSet<TaskId> = closing.iter().copied().collect();
        let mut worklist: VecDeque<TaskId> = closing_set
            .iter()
            .copied()
            .filter(|id| self.contains(*id))
            .collect();
        let mut seen: HashSet<TaskId> = HashSet::new();
        let mut unblocked = BTreeSet::new();

        while let Some(closing_id) = worklist.pop_front() {
            let Some(node) = self.get(closing_id) else {
                continue;
            };
            for &candidate in &node.dependents {
                if !seen.insert(candidate) {
                    continue;
                }
                if self.becomes_ready(candidate, &closing_set) {
                    unblocked.insert(candidate);
                }
            }
        }

        debug!(
            closing = ?closing,
            examined = seen.len(),
            unblocked = unblocked.len(),
            "Unblock frontier computed"
        );

        unblocked.into_iter().collect()
    }

    fn becomes_ready(&self, id: TaskId, closing: &HashSet<TaskId>) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        if node.closed || closing.contains(&id) {
            return false;
        }

        let satisfied_after = node
            .dependencies
            .iter()
            .all(|d| closing.contains(d) || self.is_closed(*d));
        let satisfied_before = node
            .dependencies
            .iter()
            .all(|d| !closing.contains(d) && self.is_closed(*d));

        satisfied_after && !satisfied_before
    }
}

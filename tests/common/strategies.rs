use cascade_core::models::{Priority, TaskId, TaskRecord};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::BTreeSet;

/// Strategy for generating task priorities
pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Critical),
        Just(Priority::High),
        Just(Priority::Medium),
        Just(Priority::Low),
        Just(Priority::Trivial),
    ]
}

/// Shape of one generated node before ids are assigned
#[derive(Debug, Clone)]
pub struct NodeShape {
    pub dependencies: Vec<Index>,
    pub priority: Priority,
    pub closed: bool,
}

pub fn node_shape_strategy() -> impl Strategy<Value = NodeShape> {
    (
        prop::collection::vec(any::<Index>(), 0..4),
        priority_strategy(),
        prop::bool::weighted(0.3),
    )
        .prop_map(|(dependencies, priority, closed)| NodeShape {
            dependencies,
            priority,
            closed,
        })
}

/// Ids are `1..=n`; every dependency points at a lower id, so the result is acyclic
pub fn build_dag(shapes: Vec<NodeShape>) -> Vec<TaskRecord> {
    shapes
        .into_iter()
        .enumerate()
        .map(|(position, shape)| {
            let id = position as TaskId + 1;
            let dependencies: BTreeSet<TaskId> = if position == 0 {
                BTreeSet::new()
            } else {
                shape
                    .dependencies
                    .iter()
                    .map(|index| index.index(position) as TaskId + 1)
                    .collect()
            };
            let record = TaskRecord::new(id, dependencies).with_priority(shape.priority);
            if shape.closed {
                record.closed()
            } else {
                record
            }
        })
        .collect()
}

/// Strategy for generating random acyclic snapshots
pub fn dag_records_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<TaskRecord>> {
    prop::collection::vec(node_shape_strategy(), 1..=max_nodes).prop_map(build_dag)
}

/// Strategy for generating snapshots containing at least one cycle.
///
/// Returns the records and the ids of the injected ring.
pub fn cyclic_records_strategy(
    max_nodes: usize,
) -> impl Strategy<Value = (Vec<TaskRecord>, Vec<TaskId>)> {
    (2..=max_nodes.max(2))
        .prop_flat_map(|n| {
            let ids: Vec<TaskId> = (1..=n as TaskId).collect();
            (
                prop::collection::vec(node_shape_strategy(), n),
                prop::sample::subsequence(ids, 2..=n.min(4)),
            )
        })
        .prop_map(|(shapes, ring)| {
            let mut records = build_dag(shapes);
            for (position, &id) in ring.iter().enumerate() {
                let previous = ring[(position + ring.len() - 1) % ring.len()];
                let record = &mut records[(id - 1) as usize];
                if !record.dependencies.contains(&previous) {
                    record.dependencies.push(previous);
                }
            }
            (records, ring)
        })
}

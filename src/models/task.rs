//! # Task Model
//!
//! Task records as supplied by the upstream tracker parser, and the graph node
//! they become once the dependency graph is built.
//!
//! ## Overview
//!
//! A [`TaskRecord`] is the raw, parser-facing shape: an id, the ids it depends on,
//! a priority, a closed flag and the labels currently applied to the tracker item.
//! A [`TaskNode`] adds the derived `dependents` set, which is computed once when the
//! graph is built and never mutated on its own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a tracker item. Valid ids are `>= 1`.
pub type TaskId = i64;

/// Task priority, ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Trivial,
}

impl Priority {
    /// Numeric weight used for tie-breaking and critical path priority sums.
    pub fn weight(self) -> u32 {
        match self {
            Priority::Critical => 5,
            Priority::High => 4,
            Priority::Medium => 3,
            Priority::Low => 2,
            Priority::Trivial => 1,
        }
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.weight().cmp(&other.weight())
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Trivial => "trivial",
        };
        f.write_str(name)
    }
}

/// A task as delivered by the upstream parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,

    #[serde(default)]
    pub dependencies: Vec<TaskId>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub closed: bool,

    #[serde(default)]
    pub title: String,

    /// Labels currently applied to the tracker item
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl TaskRecord {
    pub fn new(id: TaskId, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            id,
            dependencies: dependencies.into_iter().collect(),
            priority: Priority::default(),
            closed: false,
            title: String::new(),
            labels: BTreeSet::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }
}

/// A node of the dependency graph.
///
/// `dependents` is the inverse of `dependencies` across the whole graph and is
/// filled in by the graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub dependencies: BTreeSet<TaskId>,
    pub dependents: BTreeSet<TaskId>,
    pub priority: Priority,
    pub closed: bool,
    pub title: String,
    pub labels: BTreeSet<String>,
}

impl TaskNode {
    pub(crate) fn from_record(record: TaskRecord) -> Self {
        Self {
            id: record.id,
            dependencies: record.dependencies.into_iter().collect(),
            dependents: BTreeSet::new(),
            priority: record.priority,
            closed: record.closed,
            title: record.title,
            labels: record.labels,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }
}

//! Operation-level enums shared by the queue, executor and propagation engine.

use super::task::Priority;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a remote operation does on the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    Create,
    Update,
    Read,
    Comment,
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationCategory::Create => "create",
            OperationCategory::Update => "update",
            OperationCategory::Read => "read",
            OperationCategory::Comment => "comment",
        };
        f.write_str(name)
    }
}

/// Dispatch tier of a remote operation. Declaration order is dispatch order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum OperationPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl OperationPriority {
    pub const TIERS: usize = 4;

    pub fn tier(self) -> usize {
        self as usize
    }

    pub fn from_tier(tier: usize) -> Self {
        match tier {
            0 => OperationPriority::Critical,
            1 => OperationPriority::High,
            2 => OperationPriority::Normal,
            _ => OperationPriority::Low,
        }
    }

    /// One tier more urgent, saturating at `Critical`.
    pub fn promoted(self) -> Self {
        Self::from_tier(self.tier().saturating_sub(1))
    }

    pub fn is_critical(self) -> bool {
        self == OperationPriority::Critical
    }
}

impl From<Priority> for OperationPriority {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Critical => OperationPriority::Critical,
            Priority::High => OperationPriority::High,
            Priority::Medium => OperationPriority::Normal,
            Priority::Low | Priority::Trivial => OperationPriority::Low,
        }
    }
}

impl fmt::Display for OperationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationPriority::Critical => "critical",
            OperationPriority::High => "high",
            OperationPriority::Normal => "normal",
            OperationPriority::Low => "low",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_saturates_at_critical() {
        assert_eq!(OperationPriority::Low.promoted(), OperationPriority::Normal);
        assert_eq!(OperationPriority::High.promoted(), OperationPriority::Critical);
        assert_eq!(
            OperationPriority::Critical.promoted(),
            OperationPriority::Critical
        );
    }

    #[test]
    fn test_task_priority_mapping() {
        assert_eq!(
            OperationPriority::from(Priority::Trivial),
            OperationPriority::Low
        );
        assert_eq!(
            OperationPriority::from(Priority::Medium),
            OperationPriority::Normal
        );
        assert!(OperationPriority::from(Priority::Critical).is_critical());
    }
}

//! Four-tier FIFO queue with starvation promotion.

use crate::models::OperationPriority;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct QueueEntry<T> {
    item: T,
    seq: u64,
    enqueued_at: Instant,
    /// When the entry arrived in its current tier
    tier_since: Instant,
}

/// Pending items ordered by tier, FIFO within a tier.
///
/// An entry that has waited in a non-critical tier for at least the starvation
/// threshold moves up one tier. Promotion resets its tier clock, so a Low entry
/// needs three full thresholds to reach Critical. Promoted entries keep their
/// arrival order relative to entries already in the target tier.
#[derive(Debug)]
pub struct PriorityRequestQueue<T> {
    tiers: [VecDeque<QueueEntry<T>>; OperationPriority::TIERS],
    starvation_threshold: Duration,
    next_seq: u64,
    promotions: u64,
}

impl<T> PriorityRequestQueue<T> {
    pub fn new(starvation_threshold: Duration) -> Self {
        Self {
            tiers: Default::default(),
            starvation_threshold,
            next_seq: 0,
            promotions: 0,
        }
    }

    pub fn push(&mut self, priority: OperationPriority, item: T) {
        self.push_at(priority, item, Instant::now());
    }

    pub fn push_at(&mut self, priority: OperationPriority, item: T, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tiers[priority.tier()].push_back(QueueEntry {
            item,
            seq,
            enqueued_at: now,
            tier_since: now,
        });
    }

    /// Remove the next item to dispatch, promoting starved entries first
    pub fn pop(&mut self) -> Option<T> {
        self.pop_at(Instant::now())
    }

    pub fn pop_at(&mut self, now: Instant) -> Option<T> {
        self.promote_starved(now);
        self.tiers
            .iter_mut()
            .find_map(|tier| tier.pop_front())
            .map(|entry| entry.item)
    }

    /// Move every entry that waited past the threshold up one tier.
    /// Returns the number of entries promoted.
    pub fn promote_starved(&mut self, now: Instant) -> usize {
        let threshold = self.starvation_threshold;
        let mut promoted = 0;

        // Top-down so an entry moves at most one tier per call
        for tier in 1..OperationPriority::TIERS {
            let (higher, lower) = self.tiers.split_at_mut(tier);
            let source = &mut lower[0];
            let target = &mut higher[tier - 1];

            // Tier clocks are not monotone within a tier once promotions happen,
            // so every entry is checked rather than stopping at the first fresh one
            let mut index = 0;
            while index < source.len() {
                if now.saturating_duration_since(source[index].tier_since) < threshold {
                    index += 1;
                    continue;
                }
                if let Some(mut entry) = source.remove(index) {
                    entry.tier_since = now;
                    let position = target.partition_point(|existing| existing.seq < entry.seq);
                    target.insert(position, entry);
                    promoted += 1;
                }
            }
        }

        self.promotions += promoted as u64;
        promoted
    }

    /// Longest current wait among queued entries
    pub fn oldest_wait(&self, now: Instant) -> Option<Duration> {
        self.tiers
            .iter()
            .flat_map(|tier| tier.iter())
            .map(|entry| now.saturating_duration_since(entry.enqueued_at))
            .max()
    }

    pub fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }

    pub fn tier_len(&self, priority: OperationPriority) -> usize {
        self.tiers[priority.tier()].len()
    }

    pub fn total_promotions(&self) -> u64 {
        self.promotions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> PriorityRequestQueue<&'static str> {
        PriorityRequestQueue::new(Duration::from_secs(30))
    }

    #[test]
    fn test_higher_tiers_dispatch_first() {
        let now = Instant::now();
        let mut queue = queue();
        queue.push_at(OperationPriority::Low, "low", now);
        queue.push_at(OperationPriority::Critical, "critical", now);
        queue.push_at(OperationPriority::Normal, "normal", now);
        queue.push_at(OperationPriority::High, "high", now);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_at(now)).collect();
        assert_eq!(order, vec!["critical", "high", "normal", "low"]);
    }

    #[test]
    fn test_fifo_within_tier() {
        let now = Instant::now();
        let mut queue = queue();
        for name in ["a", "b", "c"] {
            queue.push_at(OperationPriority::Normal, name, now);
        }
        assert_eq!(queue.pop_at(now), Some("a"));
        assert_eq!(queue.pop_at(now), Some("b"));
        assert_eq!(queue.pop_at(now), Some("c"));
        assert_eq!(queue.pop_at(now), None);
    }

    #[test]
    fn test_starved_entry_promoted_one_tier() {
        let start = Instant::now();
        let mut queue = queue();
        queue.push_at(OperationPriority::Low, "old-low", start);

        let later = start + Duration::from_secs(30);
        queue.push_at(OperationPriority::Normal, "fresh-normal", later);
        queue.push_at(OperationPriority::High, "fresh-high", later);

        assert_eq!(queue.promote_starved(later), 1);
        assert_eq!(queue.tier_len(OperationPriority::Normal), 2);
        assert_eq!(queue.tier_len(OperationPriority::Low), 0);

        // Promoted entry is older than the normal one, so it goes first in that tier
        assert_eq!(queue.pop_at(later), Some("fresh-high"));
        assert_eq!(queue.pop_at(later), Some("old-low"));
        assert_eq!(queue.pop_at(later), Some("fresh-normal"));
    }

    #[test]
    fn test_promotion_resets_tier_clock() {
        let start = Instant::now();
        let mut queue = queue();
        queue.push_at(OperationPriority::Low, "x", start);

        queue.promote_starved(start + Duration::from_secs(30));
        assert_eq!(queue.tier_len(OperationPriority::Normal), 1);

        queue.promote_starved(start + Duration::from_secs(45));
        assert_eq!(queue.tier_len(OperationPriority::Normal), 1);

        queue.promote_starved(start + Duration::from_secs(60));
        assert_eq!(queue.tier_len(OperationPriority::High), 1);
        assert_eq!(queue.total_promotions(), 2);
    }

    #[test]
    fn test_critical_tier_never_promoted() {
        let start = Instant::now();
        let mut queue = queue();
        queue.push_at(OperationPriority::Critical, "c", start);
        assert_eq!(queue.promote_starved(start + Duration::from_secs(3600)), 0);
        assert_eq!(
            queue.oldest_wait(start + Duration::from_secs(10)),
            Some(Duration::from_secs(10))
        );
    }
}

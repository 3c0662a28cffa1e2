//! Executor counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the executor
#[derive(Debug, Default)]
pub struct ExecutorMetrics {
    operations: AtomicU64,
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    fast_failures: AtomicU64,
    timeouts: AtomicU64,
    throttle_waits: AtomicU64,
}

/// Serializable copy of [`ExecutorMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorMetricsSnapshot {
    /// Calls to `execute`
    pub operations: u64,
    /// Network attempts actually made
    pub attempts: u64,
    pub successes: u64,
    /// Operations that ended in an error
    pub failures: u64,
    pub retries: u64,
    /// Rejections by an open circuit
    pub fast_failures: u64,
    pub timeouts: u64,
    pub throttle_waits: u64,
}

impl ExecutorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fast_failure(&self) {
        self.fast_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_throttle_wait(&self) {
        self.throttle_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ExecutorMetricsSnapshot {
        ExecutorMetricsSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            fast_failures: self.fast_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            throttle_waits: self.throttle_waits.load(Ordering::Relaxed),
        }
    }
}

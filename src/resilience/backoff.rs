//! # Retry Backoff
//!
//! Per-category delay computation for retryable failures.
//!
//! Every retryable [`ErrorKind`] has its own [`CategoryBackoff`] and its own
//! jitter strategy so that callers failing for the same reason do not retry in
//! lockstep:
//!
//! | kind           | jitter                                             |
//! |----------------|----------------------------------------------------|
//! | `rate_limited` | decorrelated: `random(base, previous * 3)`         |
//! | `network`      | equal: half fixed, half random                     |
//! | `server`       | full: `random(0, computed)`                        |
//! | `timeout`      | exponential with up to 20% added, short cap        |
//! | `unknown`      | equal                                              |
//!
//! `computed = base * multiplier^(attempt - 1)`, and every result is capped at
//! the category maximum. An explicit retry-after from the remote replaces the
//! computed delay, capped at `max_retry_after_seconds`.

use crate::config::{BackoffConfig, CategoryBackoff};
use crate::remote::ErrorKind;
use parking_lot::Mutex;
use std::time::Duration;

/// Shared delay calculator, one per executor
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    rng: Mutex<fastrand::Rng>,
}

impl BackoffPolicy {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            config: config.clone(),
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Deterministic jitter for tests and simulations
    pub fn with_seed(config: &BackoffConfig, seed: u64) -> Self {
        Self {
            config: config.clone(),
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Backoff settings for a retryable kind; `None` for terminal kinds
    pub fn category(&self, kind: ErrorKind) -> Option<&CategoryBackoff> {
        match kind {
            ErrorKind::RateLimited => Some(&self.config.rate_limited),
            ErrorKind::Network => Some(&self.config.network),
            ErrorKind::Server => Some(&self.config.server),
            ErrorKind::Timeout => Some(&self.config.timeout),
            ErrorKind::Unknown => Some(&self.config.unknown),
            ErrorKind::Validation
            | ErrorKind::Auth
            | ErrorKind::NotFound
            | ErrorKind::CircuitOpen => None,
        }
    }

    /// Total attempts allowed for an operation whose latest failure was `kind`
    pub fn max_attempts(&self, kind: ErrorKind) -> u32 {
        self.category(kind).map_or(1, |category| category.max_attempts)
    }

    /// Delay before the next attempt after `attempt` attempts have failed.
    ///
    /// `previous` is the delay used before the last attempt, which decorrelated
    /// jitter grows from. Terminal kinds return zero.
    pub fn delay(&self, kind: ErrorKind, attempt: u32, previous: Option<Duration>) -> Duration {
        let Some(category) = self.category(kind) else {
            return Duration::ZERO;
        };

        let base_ms = category.base_ms;
        let max_ms = category.max_ms.max(base_ms);
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let computed_ms =
            (base_ms as f64 * category.multiplier.powi(exponent)).min(max_ms as f64) as u64;

        let mut rng = self.rng.lock();
        let delay_ms = match kind {
            ErrorKind::RateLimited => {
                let previous_ms = previous.map_or(base_ms, |d| d.as_millis() as u64);
                let upper = previous_ms.saturating_mul(3).max(base_ms);
                rng.u64(base_ms..=upper)
            }
            ErrorKind::Server => rng.u64(0..=computed_ms),
            ErrorKind::Timeout => computed_ms + (computed_ms as f64 * 0.2 * rng.f64()) as u64,
            _ => {
                let half = computed_ms / 2;
                half + rng.u64(0..=computed_ms - half)
            }
        };

        Duration::from_millis(delay_ms.min(max_ms))
    }

    /// Start tracking retries for one operation
    pub fn retry_policy(&self) -> RetryPolicy<'_> {
        RetryPolicy {
            backoff: self,
            previous_delay: None,
        }
    }
}

/// Retry bookkeeping for one operation's attempts
#[derive(Debug)]
pub struct RetryPolicy<'a> {
    backoff: &'a BackoffPolicy,
    previous_delay: Option<Duration>,
}

impl RetryPolicy<'_> {
    /// Whether another attempt is allowed after `attempts` attempts ended in `kind`
    pub fn should_retry(&self, kind: ErrorKind, attempts: u32) -> bool {
        kind.is_retryable() && attempts < self.backoff.max_attempts(kind)
    }

    /// Delay before the next attempt; a remote retry-after wins over the computed value
    pub fn next_delay(
        &mut self,
        kind: ErrorKind,
        attempts: u32,
        retry_after: Option<Duration>,
    ) -> Duration {
        let delay = match retry_after {
            Some(requested) => requested.min(self.backoff.config.max_retry_after()),
            None => self.backoff.delay(kind, attempts, self.previous_delay),
        };
        self.previous_delay = Some(delay);
        delay
    }
}

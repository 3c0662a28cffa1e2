//! Remote quota tracking.
//!
//! [`RateLimitTracker`] keeps the latest [`RateLimitSnapshot`] for one endpoint,
//! plus a short window of samples used to extrapolate when usage will fall back
//! under the throttle threshold. Every method has an `_at` variant taking an
//! explicit clock reading so behavior can be tested without real time passing.

use crate::config::RateLimitConfig;
use crate::remote::QuotaMetadata;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// Latest quota state reported by the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

impl RateLimitSnapshot {
    /// `(limit - remaining) / limit`, clamped to [0, 1]
    pub fn usage_fraction(&self) -> f64 {
        if self.limit == 0 {
            return 1.0;
        }
        let used = self.limit.saturating_sub(self.remaining);
        (used as f64 / self.limit as f64).clamp(0.0, 1.0)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        match (now - self.observed_at).to_std() {
            Ok(age) => age > stale_after,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    snapshot: Option<RateLimitSnapshot>,
    /// (observed_at, remaining) within the current reset window
    samples: VecDeque<(DateTime<Utc>, u32)>,
    hard_limited_until: Option<DateTime<Utc>>,
}

/// Quota tracker for one remote endpoint
#[derive(Debug)]
pub struct RateLimitTracker {
    config: RateLimitConfig,
    state: Mutex<TrackerState>,
}

impl RateLimitTracker {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            config: config.clone(),
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Refresh from a response's quota metadata
    pub fn update(&self, quota: &QuotaMetadata) {
        self.update_at(quota, Utc::now());
    }

    pub fn update_at(&self, quota: &QuotaMetadata, now: DateTime<Utc>) {
        if quota.limit == 0 {
            debug!("Ignoring quota metadata with zero limit");
            return;
        }

        let mut state = self.state.lock();
        let new_window = state
            .snapshot
            .is_none_or(|previous| previous.reset_at != quota.reset_at);
        if new_window {
            state.samples.clear();
        }

        state.snapshot = Some(RateLimitSnapshot {
            remaining: quota.remaining,
            limit: quota.limit,
            reset_at: quota.reset_at,
            observed_at: now,
        });
        state.samples.push_back((now, quota.remaining));
        while state.samples.len() > self.config.trend_window.max(2) {
            state.samples.pop_front();
        }

        if quota.remaining > 0 {
            state.hard_limited_until = None;
        }
    }

    /// Pin the tracker to an exhausted quota after a hard rate-limit rejection.
    ///
    /// The pin lasts until `now + retry_after` when given, otherwise until the
    /// snapshot's reset instant.
    pub fn record_hard_limit(&self, retry_after: Option<Duration>) {
        self.record_hard_limit_at(retry_after, Utc::now());
    }

    pub fn record_hard_limit_at(&self, retry_after: Option<Duration>, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        if let Some(snapshot) = state.snapshot.as_mut() {
            snapshot.remaining = 0;
            snapshot.observed_at = now;
        }

        let until = retry_after
            .and_then(|delay| chrono::Duration::from_std(delay).ok())
            .map(|delay| now + delay)
            .or_else(|| state.snapshot.map(|snapshot| snapshot.reset_at));

        if let Some(until) = until {
            state.hard_limited_until = Some(
                state
                    .hard_limited_until
                    .map_or(until, |existing| existing.max(until)),
            );
        }

        warn!(
            hard_limited_until = ?state.hard_limited_until,
            "🚦 Hard rate limit recorded"
        );
    }

    pub fn snapshot(&self) -> Option<RateLimitSnapshot> {
        self.state.lock().snapshot
    }

    /// Usage of the current, non-stale window; 0.0 when nothing is known
    pub fn usage_fraction(&self) -> f64 {
        self.usage_fraction_at(Utc::now())
    }

    pub fn usage_fraction_at(&self, now: DateTime<Utc>) -> f64 {
        let state = self.state.lock();
        self.live_snapshot(&state, now)
            .map_or(0.0, |snapshot| snapshot.usage_fraction())
    }

    pub fn is_throttled(&self) -> bool {
        self.is_throttled_at(Utc::now())
    }

    /// True while hard-limited, or while the live snapshot's usage is at or above
    /// the threshold. The comparison is inclusive: with a threshold of 0.9, a
    /// window with exactly 90% of its quota used is already throttled. Stale
    /// snapshots and elapsed reset windows never throttle.
    pub fn is_throttled_at(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.lock();
        self.throttled(&state, now)
    }

    /// When usage is expected to be back under the threshold, or `None` if not throttled
    pub fn predicted_safe_time(&self) -> Option<DateTime<Utc>> {
        self.predicted_safe_time_at(Utc::now())
    }

    pub fn predicted_safe_time_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let state = self.state.lock();
        if !self.throttled(&state, now) {
            return None;
        }

        if let Some(until) = state.hard_limited_until.filter(|until| *until > now) {
            return Some(until);
        }

        let snapshot = self.live_snapshot(&state, now)?;
        let target_remaining =
            (snapshot.limit as f64 * (1.0 - self.config.throttle_threshold)).ceil() + 1.0;
        let deficit = target_remaining - snapshot.remaining as f64;

        let extrapolated = recovery_rate(&state.samples)
            .filter(|rate| *rate > 0.0)
            .and_then(|rate| {
                let seconds = deficit.max(0.0) / rate;
                chrono::Duration::try_milliseconds((seconds * 1000.0) as i64)
            })
            .map(|wait| now + wait);

        Some(match extrapolated {
            Some(at) => at.min(snapshot.reset_at),
            None => snapshot.reset_at,
        })
    }

    /// How long a non-critical operation should wait before dispatch
    pub fn throttle_delay(&self) -> Option<Duration> {
        self.throttle_delay_at(Utc::now())
    }

    pub fn throttle_delay_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let safe_at = self.predicted_safe_time_at(now)?;
        let wait = (safe_at - now).to_std().unwrap_or(Duration::ZERO);
        Some(wait.min(self.config.max_throttle_wait()))
    }

    /// Time left on a hard rate-limit rejection, or `None` once it has expired.
    ///
    /// Unlike [`throttle_delay`](Self::throttle_delay) this ignores usage, so it
    /// applies to critical operations too.
    pub fn hard_limit_delay(&self) -> Option<Duration> {
        self.hard_limit_delay_at(Utc::now())
    }

    pub fn hard_limit_delay_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let state = self.state.lock();
        state
            .hard_limited_until
            .filter(|until| *until > now)
            .map(|until| {
                let wait = (until - now).to_std().unwrap_or(Duration::ZERO);
                wait.min(self.config.max_throttle_wait())
            })
    }

    fn throttled(&self, state: &TrackerState, now: DateTime<Utc>) -> bool {
        if state.hard_limited_until.is_some_and(|until| until > now) {
            return true;
        }
        self.live_snapshot(state, now).is_some_and(|snapshot| {
            snapshot.usage_fraction() >= self.config.throttle_threshold
        })
    }

    fn live_snapshot(&self, state: &TrackerState, now: DateTime<Utc>) -> Option<RateLimitSnapshot> {
        state.snapshot.filter(|snapshot| {
            !snapshot.is_stale(now, self.config.stale_after()) && now < snapshot.reset_at
        })
    }
}

/// Remaining-quota units regained per second over the sample window
fn recovery_rate(samples: &VecDeque<(DateTime<Utc>, u32)>) -> Option<f64> {
    let (first_at, first_remaining) = *samples.front()?;
    let (last_at, last_remaining) = *samples.back()?;
    let elapsed = (last_at - first_at).num_milliseconds() as f64 / 1000.0;
    if elapsed <= 0.0 {
        return None;
    }
    Some((last_remaining as f64 - first_remaining as f64) / elapsed)
}

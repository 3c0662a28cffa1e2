//! # Circuit Breaker Implementation
//!
//! Fault isolation for one remote endpoint. Three states: Closed (normal
//! operation), Open (failing fast without touching the network) and Half-Open
//! (exactly one trial call decides whether the endpoint has recovered).
//!
//! The breaker does not run operations itself. Callers take a [`CircuitPermit`]
//! with [`CircuitBreaker::try_acquire`], perform the call, and report the
//! classified result through [`CircuitPermit::record`]. A permit dropped without
//! a recorded outcome releases the half-open trial slot so a cancelled trial
//! cannot wedge the circuit.

use crate::config::CircuitBreakerConfig;
use crate::remote::ErrorKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - a single trial call is allowed
    HalfOpen,
}

/// What a finished call tells the breaker about endpoint health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitOutcome {
    /// The endpoint answered; resets the failure streak
    Success,
    /// Server, network or timeout failure
    Failure,
    /// Says nothing about endpoint health
    Neutral,
}

impl CircuitOutcome {
    /// Map a classified failure onto its circuit effect.
    ///
    /// Auth, validation, not-found and rate-limited responses prove the endpoint
    /// is up and answering, so they count as success. Unknown failures are neutral.
    pub fn from_error_kind(kind: ErrorKind) -> Self {
        if kind.counts_toward_circuit() {
            CircuitOutcome::Failure
        } else if kind == ErrorKind::Unknown || kind == ErrorKind::CircuitOpen {
            CircuitOutcome::Neutral
        } else {
            CircuitOutcome::Success
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    pub trial_in_flight: bool,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub times_opened: u64,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    rejected_count: u64,
    times_opened: u64,
}

impl CircuitInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            rejected_count: 0,
            times_opened: 0,
        }
    }
}

/// Per-endpoint circuit breaker shared by every caller of that endpoint
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Endpoint name for logging and metrics
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<CircuitInner>,
}

/// Permission to make one call through the breaker
#[derive(Debug)]
#[must_use = "a permit must be recorded or dropped"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CircuitPermit<'_> {
    /// Whether this permit is the single half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Report the outcome of the call made under this permit.
    pub fn record(mut self, outcome: CircuitOutcome) {
        self.settled = true;
        self.breaker.record(self.trial, outcome);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.record(true, CircuitOutcome::Neutral);
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout_ms,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout(),
            inner: Mutex::new(CircuitInner::new()),
        }
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, accounting for an elapsed reset timeout
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Open if self.reset_elapsed(&inner) => CircuitState::HalfOpen,
            state => state,
        }
    }

    /// Ask for permission to make a call.
    ///
    /// Returns `None` while open, and while half-open with the trial already
    /// taken. The first caller after the reset timeout receives the trial permit.
    pub fn try_acquire(&self) -> Option<CircuitPermit<'_>> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open && self.reset_elapsed(&inner) {
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
            info!(
                component = %self.name,
                "🟡 Circuit breaker half-open (testing recovery)"
            );
        }

        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                true
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                inner.rejected_count += 1;
                debug!(
                    component = %self.name,
                    state = ?inner.state,
                    "⛔ Call rejected by circuit breaker"
                );
                return None;
            }
        };

        inner.total_calls += 1;
        Some(CircuitPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn reset_elapsed(&self, inner: &CircuitInner) -> bool {
        inner
            .opened_at
            .is_some_and(|opened| opened.elapsed() >= self.reset_timeout)
    }

    fn record(&self, trial: bool, outcome: CircuitOutcome) {
        let mut inner = self.inner.lock();
        match outcome {
            CircuitOutcome::Success => inner.success_count += 1,
            CircuitOutcome::Failure => inner.failure_count += 1,
            CircuitOutcome::Neutral => {}
        }

        match (inner.state, trial, outcome) {
            (CircuitState::HalfOpen, true, CircuitOutcome::Success) => {
                self.transition_to_closed(&mut inner);
            }
            (CircuitState::HalfOpen, true, CircuitOutcome::Failure) => {
                self.transition_to_open(&mut inner);
            }
            (CircuitState::HalfOpen, true, CircuitOutcome::Neutral) => {
                inner.trial_in_flight = false;
                debug!(component = %self.name, "Half-open trial released without verdict");
            }
            (CircuitState::Closed, _, CircuitOutcome::Success) => {
                inner.consecutive_failures = 0;
            }
            (CircuitState::Closed, _, CircuitOutcome::Failure) => {
                inner.consecutive_failures += 1;
                warn!(
                    component = %self.name,
                    consecutive_failures = inner.consecutive_failures,
                    failure_threshold = self.failure_threshold,
                    "🔴 Endpoint failure recorded"
                );
                if inner.consecutive_failures >= self.failure_threshold {
                    self.transition_to_open(&mut inner);
                }
            }
            // Results of calls admitted before the circuit opened do not move it
            _ => {}
        }
    }

    fn transition_to_closed(&self, inner: &mut CircuitInner) {
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;

        info!(
            component = %self.name,
            total_calls = inner.total_calls,
            "🟢 Circuit breaker closed (recovered)"
        );
    }

    fn transition_to_open(&self, inner: &mut CircuitInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.trial_in_flight = false;
        inner.times_opened += 1;

        error!(
            component = %self.name,
            consecutive_failures = inner.consecutive_failures,
            failure_threshold = self.failure_threshold,
            reset_timeout_ms = self.reset_timeout.as_millis() as u64,
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        let mut inner = self.inner.lock();
        self.transition_to_open(&mut inner);
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        let mut inner = self.inner.lock();
        self.transition_to_closed(&mut inner);
    }

    /// Get current state and counters
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at,
            trial_in_flight: inner.trial_in_flight,
            total_calls: inner.total_calls,
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            rejected_count: inner.rejected_count,
            times_opened: inner.times_opened,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker(threshold: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            &CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout_ms: reset_ms,
            },
        )
    }

    fn fail(circuit: &CircuitBreaker) {
        circuit
            .try_acquire()
            .expect("circuit should admit")
            .record(CircuitOutcome::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_consecutive_failures() {
        let circuit = breaker(5, 60_000);

        for _ in 0..4 {
            fail(&circuit);
        }
        assert_eq!(circuit.state(), CircuitState::Closed);

        fail(&circuit);
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(circuit.try_acquire().is_none());
        assert_eq!(circuit.snapshot().rejected_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_streak() {
        let circuit = breaker(3, 60_000);
        fail(&circuit);
        fail(&circuit);
        circuit
            .try_acquire()
            .unwrap()
            .record(CircuitOutcome::from_error_kind(ErrorKind::NotFound));
        fail(&circuit);
        fail(&circuit);

        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.snapshot().consecutive_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_trial_after_reset_timeout() {
        let circuit = breaker(1, 1_000);
        fail(&circuit);
        assert!(circuit.try_acquire().is_none());

        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        let trial = circuit.try_acquire().expect("trial permit");
        assert!(trial.is_trial());
        assert!(circuit.try_acquire().is_none(), "second trial must be refused");

        trial.record(CircuitOutcome::Success);
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert!(circuit.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_restarts_timer() {
        let circuit = breaker(1, 1_000);
        fail(&circuit);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        circuit
            .try_acquire()
            .expect("trial permit")
            .record(CircuitOutcome::Failure);
        assert_eq!(circuit.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(circuit.try_acquire().is_none());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(circuit.try_acquire().is_some());
        assert_eq!(circuit.snapshot().times_opened, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trial_releases_slot() {
        let circuit = breaker(1, 10);
        fail(&circuit);
        tokio::time::advance(Duration::from_millis(10)).await;

        let trial = circuit.try_acquire().expect("trial permit");
        drop(trial);
        assert!(!circuit.snapshot().trial_in_flight);
        assert!(circuit.try_acquire().expect("new trial").is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_results_do_not_move_open_circuit() {
        let circuit = breaker(2, 60_000);
        let late = circuit.try_acquire().unwrap();
        fail(&circuit);
        fail(&circuit);
        assert_eq!(circuit.state(), CircuitState::Open);

        late.record(CircuitOutcome::Success);
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_force_operations() {
        let circuit = breaker(1, 60_000);

        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);

        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            CircuitOutcome::from_error_kind(ErrorKind::Server),
            CircuitOutcome::Failure
        );
        assert_eq!(
            CircuitOutcome::from_error_kind(ErrorKind::RateLimited),
            CircuitOutcome::Success
        );
        assert_eq!(
            CircuitOutcome::from_error_kind(ErrorKind::Unknown),
            CircuitOutcome::Neutral
        );
    }
}

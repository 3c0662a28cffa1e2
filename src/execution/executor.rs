//! # Resilient Request Executor
//!
//! The single entry point through which every remote call passes.
//!
//! ## Overview
//!
//! [`ResilientExecutor::execute`] composes the per-endpoint primitives held by a
//! [`RemoteEndpointState`] into one policy, applied on every attempt:
//!
//! 1. **Throttle**: non-critical operations sleep while the rate-limit tracker
//!    reports usage at or above the threshold. Critical operations skip that
//!    wait but still sit out a hard rate-limit rejection until its retry-after
//!    instant has passed.
//! 2. **Dispatch**: wait for one of the bounded in-flight slots, in priority order.
//! 3. **Circuit**: fail fast with `circuit_open` when the breaker refuses a permit.
//! 4. **Call**: run the operation thunk under the per-operation timeout.
//! 5. **Classify**: map any rejection to an [`ErrorKind`] and feed the outcome to
//!    the rate-limit tracker and circuit breaker.
//! 6. **Retry**: back off per category and go again, or surface the error.
//!
//! The dispatch slot is released before any backoff sleep, so a retrying operation
//! never blocks other work from using the endpoint.

use super::metrics::{ExecutorMetrics, ExecutorMetricsSnapshot};
use crate::config::CascadeConfig;
use crate::logging::{log_error, log_remote_operation};
use crate::remote::{
    ErrorClassifier, ErrorKind, OperationError, RemoteOperation, StandardErrorClassifier,
};
use crate::resilience::{BackoffPolicy, CircuitOutcome, RemoteEndpointState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Applies throttling, bounded dispatch, circuit breaking, timeouts and retries
/// to remote operations against one endpoint.
pub struct ResilientExecutor {
    endpoint: Arc<RemoteEndpointState>,
    classifier: Arc<dyn ErrorClassifier>,
    backoff: BackoffPolicy,
    operation_timeout: Duration,
    metrics: ExecutorMetrics,
}

impl std::fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("endpoint", &self.endpoint.name())
            .field("classifier", &self.classifier.classifier_name())
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl ResilientExecutor {
    pub fn new(endpoint: Arc<RemoteEndpointState>, config: &CascadeConfig) -> Self {
        Self {
            endpoint,
            classifier: Arc::new(StandardErrorClassifier::new()),
            backoff: BackoffPolicy::new(&config.backoff),
            operation_timeout: config.executor.operation_timeout(),
            metrics: ExecutorMetrics::new(),
        }
    }

    /// Replace the rejection classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace the backoff policy, typically with a seeded one
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &Arc<RemoteEndpointState> {
        &self.endpoint
    }

    pub fn metrics(&self) -> ExecutorMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Current rate-limit usage of the endpoint, for batch sizing
    pub fn usage_fraction(&self) -> f64 {
        self.endpoint.rate_limit().usage_fraction()
    }

    /// Run `operation` to completion under the endpoint's resilience policy.
    ///
    /// Returns the payload of the first successful attempt, or the last
    /// classified error once the operation is terminal, out of attempts, or
    /// refused by an open circuit.
    #[instrument(
        skip_all,
        fields(operation_id = %operation.id, endpoint = %self.endpoint.name(), priority = %operation.priority)
    )]
    pub async fn execute<T: Send + 'static>(
        &self,
        operation: &RemoteOperation<T>,
    ) -> Result<T, OperationError> {
        self.metrics.record_operation();
        let endpoint = self.endpoint.name();
        let mut retry = self.backoff.retry_policy();
        let mut attempts = 0u32;

        loop {
            self.wait_for_quota(operation).await;

            let slot = self.endpoint.dispatch().acquire(operation.priority).await;

            let Some(permit) = self.endpoint.circuit().try_acquire() else {
                drop(slot);
                self.metrics.record_fast_failure();
                self.metrics.record_failure();
                let error = OperationError {
                    attempts,
                    ..OperationError::circuit_open(&operation.id, endpoint)
                };
                log_remote_operation(
                    &operation.id,
                    endpoint,
                    attempts,
                    "rejected",
                    Some(ErrorKind::CircuitOpen.as_str()),
                    None,
                );
                return Err(error);
            };

            attempts += 1;
            self.metrics.record_attempt();
            debug!(attempt = attempts, trial = permit.is_trial(), "Dispatching remote operation");

            let error = match tokio::time::timeout(self.operation_timeout, operation.invoke()).await
            {
                Ok(Ok(response)) => {
                    if let Some(quota) = response.quota.as_ref() {
                        self.endpoint.rate_limit().update(quota);
                    }
                    permit.record(CircuitOutcome::Success);
                    drop(slot);
                    self.metrics.record_success();
                    log_remote_operation(&operation.id, endpoint, attempts, "success", None, None);
                    return Ok(response.payload);
                }
                Ok(Err(rejection)) => {
                    if let Some(quota) = rejection.quota.as_ref() {
                        self.endpoint.rate_limit().update(quota);
                    }
                    let kind = self.classifier.classify(&rejection);
                    if kind == ErrorKind::RateLimited {
                        self.endpoint
                            .rate_limit()
                            .record_hard_limit(rejection.retry_after);
                    }
                    OperationError {
                        operation_id: operation.id.clone(),
                        kind,
                        status: rejection.status_code(),
                        retry_after: rejection.retry_after,
                        attempts,
                        message: rejection.message,
                    }
                }
                Err(_elapsed) => {
                    self.metrics.record_timeout();
                    OperationError {
                        attempts,
                        ..OperationError::new(
                            &operation.id,
                            ErrorKind::Timeout,
                            format!(
                                "no response within {}ms",
                                self.operation_timeout.as_millis()
                            ),
                        )
                    }
                }
            };

            permit.record(CircuitOutcome::from_error_kind(error.kind));
            drop(slot);

            if !retry.should_retry(error.kind, attempts) {
                self.metrics.record_failure();
                log_remote_operation(
                    &operation.id,
                    endpoint,
                    attempts,
                    "failed",
                    Some(error.kind.as_str()),
                    None,
                );
                if error.kind.is_retryable() {
                    log_error(
                        "executor",
                        &operation.id,
                        &error.to_string(),
                        Some("retries exhausted"),
                    );
                }
                return Err(error);
            }

            let delay = retry.next_delay(error.kind, attempts, error.retry_after);
            self.metrics.record_retry();
            warn!(
                attempt = attempts,
                error_kind = %error.kind,
                delay_ms = delay.as_millis() as u64,
                "🔁 Retrying remote operation"
            );
            log_remote_operation(
                &operation.id,
                endpoint,
                attempts,
                "retry",
                Some(error.kind.as_str()),
                Some(delay),
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn wait_for_quota<T>(&self, operation: &RemoteOperation<T>) {
        let tracker = self.endpoint.rate_limit();
        let critical = operation.priority.is_critical();
        let delay = if critical {
            tracker.hard_limit_delay()
        } else {
            tracker.throttle_delay()
        };
        let Some(delay) = delay.filter(|delay| !delay.is_zero()) else {
            return;
        };

        self.metrics.record_throttle_wait();
        if critical {
            warn!(
                delay_ms = delay.as_millis() as u64,
                "🚦 Holding critical operation until hard rate limit expires"
            );
        } else {
            warn!(
                delay_ms = delay.as_millis() as u64,
                usage = tracker.usage_fraction(),
                "🚦 Throttling non-critical operation"
            );
        }
        tokio::time::sleep(delay).await;
    }
}

//! # Cascade Configuration System
//!
//! Typed configuration for every tunable in the executor, batch processor and
//! propagation engine.
//!
//! ## Architecture
//!
//! - **YAML source**: `cascade-config.yaml` with optional `development` / `test` /
//!   `production` override sections, loaded by [`ConfigManager`]
//! - **Defaults everywhere**: every section implements `Default` and every field
//!   falls back to it, so partial files are accepted
//! - **Explicit validation**: [`CascadeConfig::validate`] rejects out-of-range values
//!   instead of silently clamping them
//! - **Direct construction**: components take their own section, so the loader is
//!   optional for embedders and tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cascade_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_in_flight = manager.config().queue.max_in_flight;
//! let threshold = manager.config().circuit_breaker.failure_threshold;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring cascade-config.yaml
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Remote quota tracking
    pub rate_limit: RateLimitConfig,

    /// Fail-fast guard per endpoint
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per-category retry policy
    pub backoff: BackoffConfig,

    /// Dispatch queue and concurrency bound
    pub queue: QueueConfig,

    /// Per-operation execution settings
    pub executor: ExecutorConfig,

    /// Adaptive batch sizing and checkpoint cadence
    pub batch: BatchConfig,

    /// Label names written by status propagation
    pub propagation: PropagationConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Usage fraction above which non-critical operations are delayed
    pub throttle_threshold: f64,
    /// Number of quota samples kept for trend extrapolation
    pub trend_window: usize,
    /// Snapshots older than this are ignored
    pub stale_after_seconds: u64,
    /// Upper bound on a single throttle delay
    pub max_throttle_wait_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            throttle_threshold: 0.9,
            trend_window: 10,
            stale_after_seconds: 300,
            max_throttle_wait_seconds: 900,
        }
    }
}

impl RateLimitConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_seconds)
    }

    pub fn max_throttle_wait(&self) -> Duration {
        Duration::from_secs(self.max_throttle_wait_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive server/network/timeout failures before opening
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a trial
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Retry settings for one error category
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CategoryBackoff {
    pub base_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    /// Total attempts including the first one
    pub max_attempts: u32,
}

impl CategoryBackoff {
    pub const fn new(base_ms: u64, max_ms: u64, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            max_ms,
            multiplier,
            max_attempts,
        }
    }

    pub fn base(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Per-category retry settings. A category given in YAML only overrides the
/// fields it names; the rest keep that category's own defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "BackoffConfigOverrides")]
pub struct BackoffConfig {
    pub rate_limited: CategoryBackoff,
    pub network: CategoryBackoff,
    pub server: CategoryBackoff,
    pub timeout: CategoryBackoff,
    /// Unknown failures retry once, conservatively
    pub unknown: CategoryBackoff,
    /// Cap applied to retry-after values sent by the remote
    pub max_retry_after_seconds: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            rate_limited: CategoryBackoff::new(1_000, 60_000, 2.0, 5),
            network: CategoryBackoff::new(500, 30_000, 2.0, 4),
            server: CategoryBackoff::new(1_000, 30_000, 2.0, 3),
            timeout: CategoryBackoff::new(500, 5_000, 1.5, 3),
            unknown: CategoryBackoff::new(1_000, 10_000, 2.0, 2),
            max_retry_after_seconds: 900,
        }
    }
}

/// Field-level overrides for one [`CategoryBackoff`]
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
struct CategoryOverrides {
    base_ms: Option<u64>,
    max_ms: Option<u64>,
    multiplier: Option<f64>,
    max_attempts: Option<u32>,
}

impl CategoryOverrides {
    fn apply(self, defaults: CategoryBackoff) -> CategoryBackoff {
        CategoryBackoff {
            base_ms: self.base_ms.unwrap_or(defaults.base_ms),
            max_ms: self.max_ms.unwrap_or(defaults.max_ms),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BackoffConfigOverrides {
    rate_limited: CategoryOverrides,
    network: CategoryOverrides,
    server: CategoryOverrides,
    timeout: CategoryOverrides,
    unknown: CategoryOverrides,
    max_retry_after_seconds: Option<u64>,
}

impl From<BackoffConfigOverrides> for BackoffConfig {
    fn from(overrides: BackoffConfigOverrides) -> Self {
        let defaults = BackoffConfig::default();
        Self {
            rate_limited: overrides.rate_limited.apply(defaults.rate_limited),
            network: overrides.network.apply(defaults.network),
            server: overrides.server.apply(defaults.server),
            timeout: overrides.timeout.apply(defaults.timeout),
            unknown: overrides.unknown.apply(defaults.unknown),
            max_retry_after_seconds: overrides
                .max_retry_after_seconds
                .unwrap_or(defaults.max_retry_after_seconds),
        }
    }
}

impl BackoffConfig {
    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_seconds)
    }

    fn categories(&self) -> [(&'static str, &CategoryBackoff); 5] {
        [
            ("rate_limited", &self.rate_limited),
            ("network", &self.network),
            ("server", &self.server),
            ("timeout", &self.timeout),
            ("unknown", &self.unknown),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Global bound on in-flight remote operations per endpoint
    pub max_in_flight: usize,
    /// Wait after which a queued operation is promoted one tier
    pub starvation_threshold_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            starvation_threshold_ms: 30_000,
        }
    }
}

impl QueueConfig {
    pub fn starvation_threshold(&self) -> Duration {
        Duration::from_millis(self.starvation_threshold_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Hard ceiling for a single attempt
    pub operation_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 30_000,
        }
    }
}

impl ExecutorConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub base_size: usize,
    pub min_size: usize,
    pub max_size: usize,
    /// Items between emitted checkpoints
    pub checkpoint_interval: usize,
    /// Batch error rate above which the size shrinks
    pub error_rate_threshold: f64,
    /// Rate-limit usage above which the size shrinks
    pub usage_threshold: f64,
    /// Rate-limit usage below which a clean batch may grow
    pub comfortable_usage: f64,
    /// Fraction of the distance to the floor/ceiling covered per adjustment
    pub adjustment_factor: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            base_size: 15,
            min_size: 5,
            max_size: 50,
            checkpoint_interval: 100,
            error_rate_threshold: 0.1,
            usage_threshold: 0.8,
            comfortable_usage: 0.5,
            adjustment_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub ready_label: String,
    pub blocked_label: String,
    /// Any label with this prefix is owned by propagation and replaced on update
    pub managed_label_prefix: String,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            ready_label: "status: ready".to_string(),
            blocked_label: "status: blocked".to_string(),
            managed_label_prefix: "status:".to_string(),
        }
    }
}

impl CascadeConfig {
    /// Reject values the components cannot operate with.
    pub fn validate(&self) -> ConfigResult<()> {
        let fraction = |field: &str, value: f64| -> ConfigResult<()> {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(ConfigurationError::validation(
                    field,
                    format!("must be in (0, 1], got {value}"),
                ))
            }
        };

        fraction("rate_limit.throttle_threshold", self.rate_limit.throttle_threshold)?;
        fraction("batch.error_rate_threshold", self.batch.error_rate_threshold)?;
        fraction("batch.usage_threshold", self.batch.usage_threshold)?;
        fraction("batch.comfortable_usage", self.batch.comfortable_usage)?;
        fraction("batch.adjustment_factor", self.batch.adjustment_factor)?;

        if self.rate_limit.trend_window < 2 {
            return Err(ConfigurationError::validation(
                "rate_limit.trend_window",
                "must keep at least 2 samples",
            ));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigurationError::validation(
                "circuit_breaker.failure_threshold",
                "must be at least 1",
            ));
        }

        for (name, category) in self.backoff.categories() {
            if category.max_attempts == 0 {
                return Err(ConfigurationError::validation(
                    format!("backoff.{name}.max_attempts"),
                    "must be at least 1",
                ));
            }
            if category.multiplier < 1.0 {
                return Err(ConfigurationError::validation(
                    format!("backoff.{name}.multiplier"),
                    format!("must be >= 1.0, got {}", category.multiplier),
                ));
            }
            if category.base_ms > category.max_ms {
                return Err(ConfigurationError::validation(
                    format!("backoff.{name}.base_ms"),
                    "must not exceed max_ms",
                ));
            }
        }

        if self.queue.max_in_flight == 0 {
            return Err(ConfigurationError::validation(
                "queue.max_in_flight",
                "must be at least 1",
            ));
        }

        if self.executor.operation_timeout_ms == 0 {
            return Err(ConfigurationError::validation(
                "executor.operation_timeout_ms",
                "must be greater than zero",
            ));
        }

        let batch = &self.batch;
        if batch.min_size == 0 || batch.min_size > batch.base_size || batch.base_size > batch.max_size
        {
            return Err(ConfigurationError::validation(
                "batch",
                format!(
                    "sizes must satisfy 1 <= min_size ({}) <= base_size ({}) <= max_size ({})",
                    batch.min_size, batch.base_size, batch.max_size
                ),
            ));
        }
        if batch.checkpoint_interval == 0 {
            return Err(ConfigurationError::validation(
                "batch.checkpoint_interval",
                "must be at least 1",
            ));
        }

        if self.propagation.ready_label == self.propagation.blocked_label {
            return Err(ConfigurationError::validation(
                "propagation",
                "ready_label and blocked_label must differ",
            ));
        }

        Ok(())
    }
}

//! # Structured Logging Module
//!
//! Environment-aware structured logging for the executor, batch processor and
//! propagation engine. Console output is human readable by default and switches
//! to JSON lines with `CASCADE_LOG_FORMAT=json`.

use chrono::Utc;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call repeatedly; only the first call installs a subscriber, and an
/// already-installed global subscriber (for instance an embedding application's)
/// is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("CASCADE_LOG_FORMAT").is_ok_and(|format| format == "json");

        let console = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .boxed()
        };

        if tracing_subscriber::registry()
            .with(console.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CASCADE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log one attempt of a remote operation
pub fn log_remote_operation(
    operation_id: &str,
    endpoint: &str,
    attempt: u32,
    outcome: &str,
    error_kind: Option<&str>,
    delay: Option<Duration>,
) {
    tracing::info!(
        operation_id = %operation_id,
        endpoint = %endpoint,
        attempt = attempt,
        outcome = %outcome,
        error_kind = error_kind,
        delay_ms = delay.map(|d| d.as_millis() as u64),
        timestamp = %Utc::now().to_rfc3339(),
        "🌐 REMOTE_OPERATION"
    );
}

/// Log the result of planning a propagation run
pub fn log_propagation_run(mode: &str, evaluated: usize, updates: usize, issues: usize) {
    tracing::info!(
        mode = %mode,
        evaluated = evaluated,
        updates = updates,
        issues = issues,
        timestamp = %Utc::now().to_rfc3339(),
        "🔀 PROPAGATION_RUN"
    );
}

/// Log progress of an adaptive batch run
pub fn log_batch_progress(
    run_id: &str,
    processed: usize,
    total: usize,
    batch_size: usize,
    succeeded: usize,
    failed: usize,
) {
    tracing::info!(
        run_id = %run_id,
        processed = processed,
        total = total,
        batch_size = batch_size,
        succeeded = succeeded,
        failed = failed,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 BATCH_PROGRESS"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

//! # Remote Endpoint Contract
//!
//! The minimal contract the executor depends on when talking to the tracker.
//!
//! ## Overview
//!
//! A [`RemoteOperation`] wraps a zero-argument thunk that performs exactly one
//! logical call and resolves to either a [`RemoteResponse`] or a
//! [`RemoteRejection`]. Rejections carry a status or transport kind, a message and
//! an optional retry-after value; they are turned into the closed [`ErrorKind`]
//! taxonomy by a single [`ErrorClassifier`] at the network boundary. Nothing past
//! the classifier looks at raw status codes.

pub mod classifier;
pub mod error;

pub use classifier::{ErrorClassifier, StandardErrorClassifier};
pub use error::{ErrorKind, OperationError};

use crate::models::{OperationCategory, OperationPriority};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Quota metadata reported by the tracker alongside a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaMetadata {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Successful result of one remote call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse<T> {
    pub payload: T,
    pub quota: Option<QuotaMetadata>,
}

impl<T> RemoteResponse<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            quota: None,
        }
    }

    pub fn with_quota(mut self, quota: QuotaMetadata) -> Self {
        self.quota = Some(quota);
        self
    }
}

/// Transport-level failure kinds, for calls that never produced a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Connect,
    Reset,
    Dns,
    Tls,
    Timeout,
    Other,
}

/// What went wrong on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Status(u16),
    Transport(TransportErrorKind),
}

/// A failed remote call as reported by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRejection {
    pub kind: RejectionKind,
    pub message: String,
    pub retry_after: Option<Duration>,
    pub quota: Option<QuotaMetadata>,
}

impl RemoteRejection {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Status(code),
            message: message.into(),
            retry_after: None,
            quota: None,
        }
    }

    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Transport(kind),
            message: message.into(),
            retry_after: None,
            quota: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_quota(mut self, quota: QuotaMetadata) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            RejectionKind::Status(code) => Some(code),
            RejectionKind::Transport(_) => None,
        }
    }
}

impl fmt::Display for RemoteRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RejectionKind::Status(code) => write!(f, "HTTP {code}: {}", self.message),
            RejectionKind::Transport(kind) => write!(f, "transport {kind:?}: {}", self.message),
        }
    }
}

/// Boxed future returned by an operation thunk
pub type OperationFuture<T> = BoxFuture<'static, Result<RemoteResponse<T>, RemoteRejection>>;

type Thunk<T> = Box<dyn Fn() -> OperationFuture<T> + Send + Sync>;

/// One logical remote call, re-invocable for retries
pub struct RemoteOperation<T> {
    pub id: String,
    pub category: OperationCategory,
    pub priority: OperationPriority,
    thunk: Thunk<T>,
}

impl<T: Send + 'static> RemoteOperation<T> {
    pub fn new<F, Fut>(
        id: impl Into<String>,
        category: OperationCategory,
        priority: OperationPriority,
        thunk: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RemoteResponse<T>, RemoteRejection>> + Send + 'static,
    {
        Self {
            id: id.into(),
            category,
            priority,
            thunk: Box::new(move || Box::pin(thunk())),
        }
    }

    /// Start one attempt
    pub fn invoke(&self) -> OperationFuture<T> {
        (self.thunk)()
    }
}

impl<T> fmt::Debug for RemoteOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteOperation")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Parse a `Retry-After` header value: delta-seconds or an RFC 2822 date.
/// Dates in the past yield `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    (date.with_timezone(&Utc) - now).to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(
            parse_retry_after("120", Utc::now()),
            Some(Duration::from_secs(120))
        );
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let parsed = parse_retry_after("Mon, 5 Jan 2026 12:00:30 +0000", now);
        assert_eq!(parsed, Some(Duration::from_secs(30)));

        let past = parse_retry_after("Mon, 5 Jan 2026 11:59:00 +0000", now);
        assert_eq!(past, None);
    }

    #[tokio::test]
    async fn test_operation_thunk_is_reinvocable() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let operation = RemoteOperation::new(
            "read:1",
            OperationCategory::Read,
            OperationPriority::Normal,
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(RemoteResponse::new(n))
                }
            },
        );

        assert_eq!(operation.invoke().await.unwrap().payload, 1);
        assert_eq!(operation.invoke().await.unwrap().payload, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejection_display() {
        let rejection = RemoteRejection::status(502, "bad gateway");
        assert_eq!(rejection.to_string(), "HTTP 502: bad gateway");
        assert_eq!(rejection.status_code(), Some(502));
    }
}

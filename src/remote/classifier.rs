//! # Remote Error Classification
//!
//! Turns raw [`RemoteRejection`]s into the closed [`ErrorKind`] taxonomy.
//!
//! ## Overview
//!
//! This is the only place in the crate that interprets status codes, transport
//! failures or message text. The executor, retry policy, circuit breaker and
//! batch processor all switch over [`ErrorKind`] instead.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ RemoteRejection │────▶│ ErrorClassifier │────▶│   ErrorKind     │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use cascade_core::remote::{
//!     ErrorClassifier, ErrorKind, RemoteRejection, StandardErrorClassifier,
//! };
//!
//! let classifier = StandardErrorClassifier::new();
//! let rejection = RemoteRejection::status(429, "API rate limit exceeded");
//! assert_eq!(classifier.classify(&rejection), ErrorKind::RateLimited);
//! ```

use super::error::ErrorKind;
use super::{RejectionKind, RemoteRejection, TransportErrorKind};

/// Strategy for classifying remote rejections
pub trait ErrorClassifier: Send + Sync {
    /// Classify a rejection into exactly one kind
    fn classify(&self, rejection: &RemoteRejection) -> ErrorKind;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;
}

/// Status-code and transport based classifier for REST issue trackers
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    fn classify_status(&self, code: u16, rejection: &RemoteRejection) -> ErrorKind {
        match code {
            429 => ErrorKind::RateLimited,
            // Trackers report exhausted quotas as 403 as well as genuine permission errors
            403 if self.looks_rate_limited(rejection) => ErrorKind::RateLimited,
            401 | 403 => ErrorKind::Auth,
            404 | 410 => ErrorKind::NotFound,
            408 | 504 => ErrorKind::Timeout,
            500..=599 => ErrorKind::Server,
            400..=499 => ErrorKind::Validation,
            _ => ErrorKind::Unknown,
        }
    }

    fn looks_rate_limited(&self, rejection: &RemoteRejection) -> bool {
        if rejection.quota.is_some_and(|quota| quota.remaining == 0) {
            return true;
        }
        let message = rejection.message.to_lowercase();
        message.contains("rate limit") || message.contains("abuse detection")
    }

    fn classify_transport(&self, kind: TransportErrorKind, message: &str) -> ErrorKind {
        match kind {
            TransportErrorKind::Timeout => ErrorKind::Timeout,
            TransportErrorKind::Connect
            | TransportErrorKind::Reset
            | TransportErrorKind::Dns
            | TransportErrorKind::Tls => ErrorKind::Network,
            TransportErrorKind::Other => {
                let message = message.to_lowercase();
                if message.contains("timed out") || message.contains("timeout") {
                    ErrorKind::Timeout
                } else if message.contains("connection")
                    || message.contains("network")
                    || message.contains("dns")
                {
                    ErrorKind::Network
                } else {
                    ErrorKind::Unknown
                }
            }
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, rejection: &RemoteRejection) -> ErrorKind {
        match rejection.kind {
            RejectionKind::Status(code) => self.classify_status(code, rejection),
            RejectionKind::Transport(kind) => self.classify_transport(kind, &rejection.message),
        }
    }

    fn classifier_name(&self) -> &'static str {
        "StandardErrorClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::QuotaMetadata;
    use chrono::Utc;

    fn classify(rejection: RemoteRejection) -> ErrorKind {
        StandardErrorClassifier::new().classify(&rejection)
    }

    #[test]
    fn test_status_code_table() {
        assert_eq!(classify(RemoteRejection::status(429, "")), ErrorKind::RateLimited);
        assert_eq!(classify(RemoteRejection::status(401, "")), ErrorKind::Auth);
        assert_eq!(classify(RemoteRejection::status(403, "forbidden")), ErrorKind::Auth);
        assert_eq!(classify(RemoteRejection::status(404, "")), ErrorKind::NotFound);
        assert_eq!(classify(RemoteRejection::status(410, "")), ErrorKind::NotFound);
        assert_eq!(classify(RemoteRejection::status(422, "")), ErrorKind::Validation);
        assert_eq!(classify(RemoteRejection::status(409, "")), ErrorKind::Validation);
        assert_eq!(classify(RemoteRejection::status(408, "")), ErrorKind::Timeout);
        assert_eq!(classify(RemoteRejection::status(504, "")), ErrorKind::Timeout);
        assert_eq!(classify(RemoteRejection::status(500, "")), ErrorKind::Server);
        assert_eq!(classify(RemoteRejection::status(503, "")), ErrorKind::Server);
        assert_eq!(classify(RemoteRejection::status(302, "")), ErrorKind::Unknown);
    }

    #[test]
    fn test_forbidden_with_exhausted_quota_is_rate_limited() {
        let quota = QuotaMetadata {
            limit: 5000,
            remaining: 0,
            reset_at: Utc::now(),
        };
        assert_eq!(
            classify(RemoteRejection::status(403, "forbidden").with_quota(quota)),
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify(RemoteRejection::status(
                403,
                "You have exceeded a secondary rate limit"
            )),
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn test_transport_kinds() {
        assert_eq!(
            classify(RemoteRejection::transport(TransportErrorKind::Timeout, "")),
            ErrorKind::Timeout
        );
        assert_eq!(
            classify(RemoteRejection::transport(TransportErrorKind::Reset, "")),
            ErrorKind::Network
        );
        assert_eq!(
            classify(RemoteRejection::transport(
                TransportErrorKind::Other,
                "operation timed out"
            )),
            ErrorKind::Timeout
        );
        assert_eq!(
            classify(RemoteRejection::transport(
                TransportErrorKind::Other,
                "connection refused"
            )),
            ErrorKind::Network
        );
        assert_eq!(
            classify(RemoteRejection::transport(TransportErrorKind::Other, "???")),
            ErrorKind::Unknown
        );
    }
}

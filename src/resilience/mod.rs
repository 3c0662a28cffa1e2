//! # Resilience Module
//!
//! Fault tolerance primitives for talking to a rate-limited, occasionally
//! failing remote tracker.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: fail fast while an endpoint is unhealthy, with a single
//!   half-open trial deciding recovery
//! - **Rate Limit Tracking**: quota snapshots, usage trend and throttle delays
//! - **Backoff**: per-category jittered retry delays with retry-after override
//! - **Endpoint State**: one explicit handle per remote endpoint bundling the
//!   above with the in-flight gate
//!
//! ## Usage
//!
//! ```rust
//! use cascade_core::config::CascadeConfig;
//! use cascade_core::resilience::{CircuitOutcome, RemoteEndpointState};
//!
//! let endpoint = RemoteEndpointState::shared("tracker", &CascadeConfig::default());
//!
//! if let Some(permit) = endpoint.circuit().try_acquire() {
//!     // ... perform the remote call ...
//!     permit.record(CircuitOutcome::Success);
//! }
//! assert!(!endpoint.rate_limit().is_throttled());
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod endpoint;
pub mod rate_limit;

pub use backoff::{BackoffPolicy, RetryPolicy};
pub use circuit_breaker::{
    CircuitBreaker, CircuitOutcome, CircuitPermit, CircuitSnapshot, CircuitState,
};
pub use endpoint::{EndpointRegistry, RemoteEndpointState};
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};

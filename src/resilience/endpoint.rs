//! Shared per-endpoint state.
//!
//! A [`RemoteEndpointState`] bundles the only mutable state the executor shares
//! between callers of one remote endpoint: its circuit breaker, its rate-limit
//! tracker and its in-flight gate. It is handed to the executor explicitly, so
//! independent endpoints (and independent tests) never see each other's state.

use super::{CircuitBreaker, RateLimitTracker};
use crate::config::CascadeConfig;
use crate::execution::DispatchQueue;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct RemoteEndpointState {
    name: String,
    circuit: CircuitBreaker,
    rate_limit: RateLimitTracker,
    dispatch: DispatchQueue,
}

impl RemoteEndpointState {
    pub fn new(name: impl Into<String>, config: &CascadeConfig) -> Self {
        let name = name.into();
        Self {
            circuit: CircuitBreaker::new(name.clone(), &config.circuit_breaker),
            rate_limit: RateLimitTracker::new(&config.rate_limit),
            dispatch: DispatchQueue::new(&config.queue),
            name,
        }
    }

    /// Convenience constructor returning the shareable handle
    pub fn shared(name: impl Into<String>, config: &CascadeConfig) -> Arc<Self> {
        Arc::new(Self::new(name, config))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    pub fn dispatch(&self) -> &DispatchQueue {
        &self.dispatch
    }
}

/// Hands out one shared state per endpoint name
#[derive(Debug)]
pub struct EndpointRegistry {
    config: CascadeConfig,
    endpoints: DashMap<String, Arc<RemoteEndpointState>>,
}

impl EndpointRegistry {
    pub fn new(config: CascadeConfig) -> Self {
        Self {
            config,
            endpoints: DashMap::new(),
        }
    }

    /// Get the state for `name`, creating it on first use
    pub fn get_or_create(&self, name: &str) -> Arc<RemoteEndpointState> {
        self.endpoints
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(endpoint = name, "Registering remote endpoint state");
                RemoteEndpointState::shared(name, &self.config)
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<RemoteEndpointState>> {
        self.endpoints.get(name).map(|entry| entry.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;

    #[test]
    fn test_registry_shares_state_per_name() {
        let registry = EndpointRegistry::new(CascadeConfig::default());
        let a = registry.get_or_create("tracker.example");
        let b = registry.get_or_create("tracker.example");
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.get_or_create("mirror.example");
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.names(), vec!["mirror.example", "tracker.example"]);
    }

    #[tokio::test]
    async fn test_endpoints_are_isolated() {
        let registry = EndpointRegistry::new(CascadeConfig::default());
        let a = registry.get_or_create("a");
        let b = registry.get_or_create("b");

        a.circuit().force_open();
        assert_eq!(a.circuit().state(), CircuitState::Open);
        assert_eq!(b.circuit().state(), CircuitState::Closed);
        assert_eq!(a.dispatch().max_in_flight(), 3);
    }
}

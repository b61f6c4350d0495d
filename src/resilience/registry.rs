//! Per-network circuit breaker registry.
//!
//! The registry is owned by the composition root and passed by
//! reference wherever breakers are needed. Entries are created lazily
//! on first use and live for the process lifetime.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::observability::events::EventSink;
use crate::resilience::circuit_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerConfig};

/// Mapping from ad network name to its circuit breaker.
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
    events: Arc<dyn EventSink>,
}

impl BreakerRegistry {
    /// Create an empty registry; breakers inherit `config`.
    pub fn new(config: CircuitBreakerConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            config,
            events,
        }
    }

    /// Get the breaker for `network`, creating it on first access.
    pub fn get_or_create(&self, network: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self
            .breakers
            .read()
            .expect("breaker registry lock poisoned")
            .get(network)
        {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().expect("breaker registry lock poisoned");
        breakers
            .entry(network.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(network, self.config, self.events.clone()))
            })
            .clone()
    }

    /// Get the breaker for `network` without creating it.
    pub fn get(&self, network: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .expect("breaker registry lock poisoned")
            .get(network)
            .cloned()
    }

    /// Reset a specific breaker. Returns `false` when unknown.
    pub async fn reset(&self, network: &str) -> bool {
        match self.get(network) {
            Some(breaker) => {
                breaker.reset().await;
                true
            }
            None => false,
        }
    }

    /// Reset every breaker to Closed.
    pub async fn reset_all(&self) {
        for breaker in self.snapshot() {
            breaker.reset().await;
        }
    }

    /// Snapshot of every breaker's stats, keyed by network.
    pub async fn stats(&self) -> BTreeMap<String, BreakerStats> {
        let mut stats = BTreeMap::new();
        for breaker in self.snapshot() {
            let s = breaker.stats().await;
            stats.insert(s.name.clone(), s);
        }
        stats
    }

    fn snapshot(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .expect("breaker registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

//! Circuit breaker for postback endpoint protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: endpoint assumed down, calls fail fast
//! - Half-Open: one trial call permitted
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures reach max_failures
//! Open → Half-Open: reset_timeout elapsed, checked lazily in execute
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! # Design Decisions
//! - Any success zeroes the consecutive-failure counter; only the
//!   Half-Open success rule closes an Open breaker
//! - The state lock is held across the protected call (see module docs
//!   of [`crate::resilience`])

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::observability::events::{Event, EventSink};
use crate::observability::metrics;

/// Breaker state names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Per-breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub max_failures: u32,
    /// How long the breaker stays Open before permitting a trial.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is Open; the call was not attempted.
    #[error("circuit breaker is open")]
    Open,
    /// The call ran and failed; the inner error is unchanged.
    #[error("{0}")]
    Call(E),
}

/// Snapshot of one breaker's state.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: &'static str,
    pub failure_count: u32,
    pub success_count: u32,
    pub max_failures: u32,
    pub reset_timeout_secs: u64,
    pub last_failure_secs_ago: Option<u64>,
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    /// Successes observed while Half-Open.
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Failure-isolating state machine guarding one outbound endpoint.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    events: Arc<dyn EventSink>,
}

impl CircuitBreaker {
    /// Create a new breaker in the Closed state.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
            events,
        }
    }

    /// Run `call` with breaker protection.
    ///
    /// Fails fast with [`BreakerError::Open`] while Open and the reset
    /// timeout has not elapsed. Otherwise the call runs (as a trial
    /// when Half-Open) and its outcome updates the state machine. The
    /// lock is held for the duration of the call.
    pub async fn execute<T, E, Fut>(&self, call: Fut) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let mut inner = self.inner.lock().await;

        if inner.state == BreakerState::Open {
            let elapsed = inner.last_failure.map(|t| t.elapsed());
            match elapsed {
                Some(elapsed) if elapsed >= self.config.reset_timeout => {
                    inner.state = BreakerState::HalfOpen;
                    inner.success_count = 0;
                    self.transition(&inner, "circuit_breaker_half_open");
                }
                _ => return Err(BreakerError::Open),
            }
        }

        match call.await {
            Ok(value) => {
                self.on_success(&mut inner);
                Ok(value)
            }
            Err(e) => {
                self.on_failure(&mut inner);
                Err(BreakerError::Call(e))
            }
        }
    }

    fn on_failure(&self, inner: &mut Inner) {
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        if inner.state == BreakerState::HalfOpen || inner.failure_count >= self.config.max_failures {
            inner.state = BreakerState::Open;
            self.transition(inner, "circuit_breaker_open");
        }
    }

    fn on_success(&self, inner: &mut Inner) {
        inner.failure_count = 0;

        if inner.state == BreakerState::HalfOpen {
            inner.success_count += 1;
            if inner.success_count >= 1 {
                inner.state = BreakerState::Closed;
                self.transition(inner, "circuit_breaker_closed");
            }
        }
    }

    fn transition(&self, inner: &Inner, kind: &str) {
        self.events.emit(
            Event::new(kind)
                .field("breaker_name", self.name.as_str())
                .field("state", inner.state.as_str())
                .field("failure_count", inner.failure_count),
        );
        metrics::record_breaker_transition(&self.name, inner.state.as_str());
    }

    /// Current state.
    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }

    /// Force Closed with zeroed counters.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        self.transition(&inner, "circuit_breaker_reset");
    }

    /// Snapshot for the stats endpoint.
    pub async fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock().await;
        BreakerStats {
            name: self.name.clone(),
            state: inner.state.as_str(),
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            max_failures: self.config.max_failures,
            reset_timeout_secs: self.config.reset_timeout.as_secs(),
            last_failure_secs_ago: inner.last_failure.map(|t| t.elapsed().as_secs()),
        }
    }
}

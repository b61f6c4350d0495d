//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Postback to an ad network:
//!     → registry.rs (get or lazily create the network's breaker)
//!     → circuit_breaker.rs (fail fast when Open, trial when Half-Open)
//!     → outbound call with its own timeout
//! ```
//!
//! # Design Decisions
//! - Per-network breakers, never a global one
//! - Open → Half-Open happens lazily inside `execute`, no timer task
//! - The breaker lock is held across the protected call, serializing
//!   calls to one network; the call's own timeout bounds the hold

pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{BreakerError, BreakerState, BreakerStats, CircuitBreaker, CircuitBreakerConfig};
pub use registry::BreakerRegistry;

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Admission gate, breakers, dispatcher produce:
//!     → events.rs (structured decision/transition records)
//!     → metrics.rs (counters)
//!     → tracing spans from tower-http on every request
//!
//! Consumers:
//!     → Log aggregation (stdout via tracing)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Event records carry typed values, not loose JSON blobs
//! - The event sink is a trait so analytics consumers can be swapped
//! - Metrics are cheap (atomic increments)

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventSink, EventValue, TracingSink};

//! Affiliate dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Conversion postback arrives:
//!     → template.rs (resolve the network's URL template)
//!     → resilience registry (per-network breaker)
//!     → outbound GET with timeout, off the request-serving path
//! ```
//!
//! # Design Decisions
//! - Forwarding is fire-and-forget: endpoint latency or failure never
//!   delays the inbound response
//! - Errors are recorded as events and swallowed, never propagated
//! - URL resolution is pure and deterministic

pub mod postback;
pub mod template;

pub use postback::{network_from_params, DispatchError, PostbackDispatcher};
pub use template::build_url;

//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming click:
//!     → gate.rs (bypass → referrer → UA → rate limit → IP prefix → geo → mobile)
//!     → Allow: pass to redirect handler
//!     → Deny: 403 + structured block event
//! ```
//!
//! # Design Decisions
//! - Checks run in a fixed order; first match wins
//! - Fully synchronous on the request path, the only blocking point is
//!   the rate limiter's mutex
//! - Fail closed on geo: unknown country is a deny when an allow-list
//!   is configured

pub mod gate;
pub mod rate_limit;

pub use gate::{AdmissionGate, Decision, DenyReason};
pub use rate_limit::RateLimiter;

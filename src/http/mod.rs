//! HTTP surface of the service.
//!
//! # Data Flow
//! ```text
//! Click:     GET / or /r → request.rs (identity) → admission gate
//!                → redirect handler (pick product, resolve URL, 302)
//! Postback:  GET /postback → ack immediately → dispatcher (spawned)
//! Admin:     /breakers, /admission, /health
//! ```
//!
//! # Design Decisions
//! - The admission gate guards only the click routes; postbacks come
//!   from ad networks, not browsers
//! - Denied clicks get an empty 403, nothing a probing bot can learn
//!   from
//! - Redirects are 302 so trackers may re-evaluate the weighted pick
//!   on every click

pub mod request;
pub mod server;

pub use request::{ClientRequest, RequestIdLayer};
pub use server::{build_router, AppState, HttpServer};

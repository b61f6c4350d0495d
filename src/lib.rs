//! clickgate: click-redirect and affiliate-tracking service.
//!
//! # Architecture
//! ```text
//! Click → http (identity, request id) → admission (bot filter,
//! rate limit, geo) → products (weighted pick) → dispatch/template
//! (resolve URL) → 302
//!
//! Conversion → http /postback → dispatch (per-network breaker,
//! outbound GET) → ad network
//! ```
//!
//! # Subsystems
//! - [`config`]: TOML configuration with defaults and validation
//! - [`http`]: axum router, handlers, request identity
//! - [`admission`]: ordered bot/fraud checks with short-circuit deny
//! - [`geo`]: IP-to-country/city resolution behind a trait
//! - [`products`]: weighted redirect destination catalog
//! - [`dispatch`]: URL templates and postback forwarding
//! - [`resilience`]: per-network circuit breakers
//! - [`observability`]: structured events, logging, metrics
//! - [`lifecycle`]: graceful shutdown coordination

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod geo;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod products;
pub mod resilience;

pub use config::{load_config, AppConfig, ConfigError};
pub use http::{build_router, AppState, HttpServer};

//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! clickgate.toml → loader.rs (read + parse) → validation.rs → AppConfig
//! ```
//!
//! # Design Decisions
//! - Serde handles syntax, validation.rs handles semantics
//! - Every section has defaults; an empty file is a runnable config
//! - No hot reload; the process restarts to pick up changes

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::*;

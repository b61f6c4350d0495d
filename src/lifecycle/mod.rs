//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Init logging/metrics → Build subsystems → Start server
//!
//! Shutdown (shutdown.rs):
//!     SIGINT received → broadcast shutdown → background tasks drain → Exit
//! ```
//!
//! # Design Decisions
//! - Subsystems are constructed at the composition root, no globals
//! - Every background task subscribes to the shutdown broadcast
//! - Tests trigger shutdown directly instead of sending signals

pub mod shutdown;

pub use shutdown::Shutdown;

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, sweeper and reload task exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Config reload is driven by the file watcher, not by signals
//! - Ordered shutdown: stop accepting, drain in-flight requests, exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

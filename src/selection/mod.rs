//! Node selection subsystem.
//!
//! # Data Flow
//! ```text
//! Healthy candidates (registration order)
//!     → policy.rs (lock cursor, refresh last_used from the registry)
//!     → sort by last_used ascending, stable
//!     → rotate among the least recently used front with the cursor
//!     → touch chosen node's last_used, advance cursor
//!     → chosen node
//! ```
//!
//! # Design Decisions
//! - The rotation cursor is process-local and starts at 0
//! - Pick-and-touch is serialized, so concurrent requests cannot double-pick
//! - The cursor is reduced modulo the current set size on every call

pub mod policy;

pub use policy::{select, SelectionError, SelectionPolicy};

//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! GET /api/hotnode:
//!     → throttle.rs (per-origin fixed window, allow-list bypass)
//!     → director
//!
//! Write endpoints:
//!     → auth.rs (X-API-Secret or Bearer token)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Throttling is a pure gate: a rejected request touches no node state
//! - Fail closed: no configured secret means no writes
//! - Every rejection is visible (activity event or warning log)

pub mod auth;
pub mod throttle;

pub use auth::ApiAuth;
pub use throttle::{Admission, RequestThrottle, ThrottleState};

//! Director subsystem: one selection cycle per inbound request.
//!
//! # Data Flow
//! ```text
//! GET /api/hotnode (already admitted by the throttle)
//!     → registry.list_enabled()      none → NoCandidates (503)
//!     → health aggregation           none → NoEligible (503)
//!     → selection policy pick + touch
//!     → public connection fields
//! ```
//!
//! # Design Decisions
//! - Steps run strictly in sequence within a request
//! - NoCandidates (nothing enabled) and NoEligible (nothing healthy) stay distinct
//! - Exactly one terminal activity event per request
//! - Administrative writes go through the same registry and emit admin events

pub mod engine;

pub use engine::{Director, DirectorError, DirectorResult, HOT_NODE_PATH};

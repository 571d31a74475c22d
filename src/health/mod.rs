//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Per selection request:
//!     enabled nodes
//!     → aggregator.rs (one concurrent probe per node, all awaited)
//!     → probe.rs (bounded GET <url>/health, classify failures, apply thresholds)
//!     → healthy subset, original order
//!     → health_summary event
//! ```
//!
//! # Design Decisions
//! - Health is evaluated fresh for every selection cycle; no state carried over
//! - One failing probe never aborts the aggregation
//! - Worst-case latency is one probe timeout, not the sum
//! - Simulate mode is an explicit toggle and logs loudly

pub mod aggregator;
pub mod probe;

pub use aggregator::HealthAggregator;
pub use probe::{HealthProber, HealthResult, ProbeErrorKind};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine and HTTP layer produce:
//!     → events.rs (activity events: selections, health summaries, throttling, admin writes)
//!     → logging.rs (structured log output)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint
//!     → /api/activity and live broadcast subscribers
//! ```
//!
//! # Design Decisions
//! - Every activity event is also a log line and a metric
//! - Request ID flows through HTTP spans
//! - Sinks never fail the request path

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{ActivityEvent, ActivityLog, EventKind, EventSink};

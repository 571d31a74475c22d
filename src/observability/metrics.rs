//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define director metrics (selections, probes, throttling, HTTP)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `director_events_total` (counter): activity events by kind
//! - `director_probes_total` (counter): probe outcomes by result
//! - `director_probe_duration_seconds` (histogram): probe latency
//! - `director_throttle_rejections_total` (counter): rejected requests
//! - `director_http_requests_total` (counter): responses by method, status
//! - `director_candidates` / `director_eligible` (gauges): last selection cycle
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels are low-cardinality: never node owners or client addresses

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_event(kind: &'static str) {
    counter!("director_events_total", "kind" => kind).increment(1);
}

pub fn record_probe(result: &'static str, start: Instant) {
    counter!("director_probes_total", "result" => result).increment(1);
    histogram!("director_probe_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_selection_cycle(candidates: usize, eligible: usize) {
    gauge!("director_candidates").set(candidates as f64);
    gauge!("director_eligible").set(eligible as f64);
}

pub fn record_throttle_rejection() {
    counter!("director_throttle_rejections_total").increment(1);
}

pub fn record_request(method: &str, status: u16) {
    counter!(
        "director_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

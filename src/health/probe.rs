//! Single-node health probe.
//!
//! # Responsibilities
//! - Issue one bounded GET against a node's health surface
//! - Classify transport failures
//! - Validate the reported payload against configured thresholds
//!
//! # Design Decisions
//! - No retries; the classification is informational only
//! - Reachable but over-threshold nodes are unhealthy
//! - Anything other than a 200 with a well-formed payload is unhealthy

use std::error::Error as StdError;
use std::io;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::HealthCheckConfig;
use crate::observability::metrics;

/// Why a probe could not obtain a usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    Timeout,
    ConnectionRefused,
    DnsError,
    Unknown,
}

impl ProbeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::ConnectionRefused => "connection_refused",
            ProbeErrorKind::DnsError => "dns_error",
            ProbeErrorKind::Unknown => "unknown",
        }
    }
}

/// Payload a node serves on its health path. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    pub enabled: Option<bool>,
    pub disk_usage_percent: Option<f64>,
    #[serde(default)]
    pub pins: Option<PinStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinStats {
    #[serde(default)]
    pub overdue: Option<f64>,
}

impl HealthReport {
    /// Overdue pin count; absent or null counts as zero.
    pub fn overdue(&self) -> f64 {
        self.pins.as_ref().and_then(|p| p.overdue).unwrap_or(0.0)
    }
}

/// The values the health decision was based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDetails {
    pub enabled: Option<bool>,
    pub disk_usage: Option<f64>,
    pub overdue: f64,
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResult {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ProbeErrorKind>,
    pub response_time_ms: u64,
}

impl HealthResult {
    fn failed(kind: ProbeErrorKind, error: String, elapsed: Duration) -> Self {
        Self {
            healthy: false,
            details: None,
            error: Some(error),
            error_kind: Some(kind),
            response_time_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Apply the configured thresholds to a health payload.
///
/// Returns the details and, when unhealthy, the first violated rule.
pub fn evaluate(report: &HealthReport, config: &HealthCheckConfig) -> (HealthDetails, Option<String>) {
    let overdue = report.overdue();
    let details = HealthDetails {
        enabled: report.enabled,
        disk_usage: report.disk_usage_percent,
        overdue,
    };

    let violation = if report.enabled != Some(true) {
        Some("node reports itself disabled".to_string())
    } else {
        match report.disk_usage_percent {
            None => Some("disk_usage_percent missing".to_string()),
            Some(disk) if disk.is_nan() || disk >= config.max_disk_usage_percent => Some(format!(
                "disk usage {}% not below {}%",
                disk, config.max_disk_usage_percent
            )),
            Some(_) if overdue > config.max_overdue_pins as f64 => Some(format!(
                "{} overdue pins exceeds {}",
                overdue, config.max_overdue_pins
            )),
            Some(_) => None,
        }
    };

    (details, violation)
}

/// Map a transport error onto the probe error taxonomy.
pub fn classify(err: &reqwest::Error) -> ProbeErrorKind {
    if err.is_timeout() {
        return ProbeErrorKind::Timeout;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return ProbeErrorKind::ConnectionRefused,
                io::ErrorKind::TimedOut => return ProbeErrorKind::Timeout,
                _ => {}
            }
        }
        if cause.to_string().contains("dns error") {
            return ProbeErrorKind::DnsError;
        }
        source = cause.source();
    }

    ProbeErrorKind::Unknown
}

/// Issues health probes. Holds only a connection pool.
#[derive(Debug, Clone)]
pub struct HealthProber {
    client: reqwest::Client,
}

impl Default for HealthProber {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthProber {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("node-director-health-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Probe `base_url` + the configured path within the configured timeout.
    pub async fn probe(&self, base_url: &str, config: &HealthCheckConfig) -> HealthResult {
        let start = Instant::now();
        let url = format!("{}{}", base_url.trim_end_matches('/'), config.path);
        let timeout = Duration::from_millis(config.timeout_ms);

        let response = match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = classify(&e);
                metrics::record_probe(kind.as_str(), start);
                tracing::debug!(url = %url, error = %e, kind = kind.as_str(), "Health probe failed");
                return HealthResult::failed(kind, e.to_string(), start.elapsed());
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            metrics::record_probe("bad_status", start);
            return HealthResult::failed(
                ProbeErrorKind::Unknown,
                format!("unexpected status {}", status),
                start.elapsed(),
            );
        }

        let report: HealthReport = match response.json().await {
            Ok(report) => report,
            Err(e) => {
                let kind = if e.is_timeout() {
                    ProbeErrorKind::Timeout
                } else {
                    ProbeErrorKind::Unknown
                };
                metrics::record_probe("malformed", start);
                return HealthResult::failed(
                    kind,
                    format!("malformed health payload: {}", e),
                    start.elapsed(),
                );
            }
        };

        let (details, violation) = evaluate(&report, config);
        let healthy = violation.is_none();
        metrics::record_probe(if healthy { "healthy" } else { "over_threshold" }, start);

        HealthResult {
            healthy,
            details: Some(details),
            error: violation,
            error_kind: None,
            response_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(enabled: bool, disk: f64, overdue: f64) -> HealthReport {
        HealthReport {
            enabled: Some(enabled),
            disk_usage_percent: Some(disk),
            pins: Some(PinStats {
                overdue: Some(overdue),
            }),
        }
    }

    #[test]
    fn test_saturated_node_is_unhealthy() {
        let (details, violation) = evaluate(&report(true, 95.0, 0.0), &HealthCheckConfig::default());
        assert!(violation.is_some());
        assert_eq!(details.disk_usage, Some(95.0));
    }

    #[test]
    fn test_idle_node_is_healthy() {
        let (_, violation) = evaluate(&report(true, 10.0, 0.0), &HealthCheckConfig::default());
        assert!(violation.is_none());
    }

    #[test]
    fn test_ceiling_is_exclusive() {
        let (_, violation) = evaluate(&report(true, 90.0, 0.0), &HealthCheckConfig::default());
        assert!(violation.is_some());
    }

    #[test]
    fn test_overdue_or_disabled_is_unhealthy() {
        let config = HealthCheckConfig::default();
        assert!(evaluate(&report(true, 10.0, 1.0), &config).1.is_some());
        assert!(evaluate(&report(false, 10.0, 0.0), &config).1.is_some());
    }

    #[test]
    fn test_missing_fields() {
        let config = HealthCheckConfig::default();
        let parsed: HealthReport = serde_json::from_str(r#"{"enabled": true}"#).unwrap();
        assert!(evaluate(&parsed, &config).1.is_some());

        let parsed: HealthReport =
            serde_json::from_str(r#"{"enabled": true, "disk_usage_percent": 45, "bandwidth_24h": {}}"#)
                .unwrap();
        assert!(evaluate(&parsed, &config).1.is_none());
    }

    #[test]
    fn test_null_or_float_overdue_counts_as_zero() {
        let config = HealthCheckConfig::default();
        for body in [
            r#"{"enabled": true, "disk_usage_percent": 20, "pins": null}"#,
            r#"{"enabled": true, "disk_usage_percent": 20, "pins": {"overdue": null}}"#,
            r#"{"enabled": true, "disk_usage_percent": 20, "pins": {"overdue": 0.0}}"#,
            r#"{"enabled": true, "disk_usage_percent": 20, "pins": {}}"#,
        ] {
            let parsed: HealthReport = serde_json::from_str(body).unwrap();
            let (details, violation) = evaluate(&parsed, &config);
            assert!(violation.is_none(), "{} judged unhealthy: {:?}", body, violation);
            assert_eq!(details.overdue, 0.0);
        }

        let parsed: HealthReport = serde_json::from_str(
            r#"{"enabled": true, "disk_usage_percent": 20, "pins": {"overdue": 2.0}}"#,
        )
        .unwrap();
        assert!(evaluate(&parsed, &config).1.is_some());
    }

    #[tokio::test]
    async fn test_refused_connection_is_classified() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = HealthProber::new()
            .probe(&format!("http://{}", addr), &HealthCheckConfig::default())
            .await;

        assert!(!result.healthy);
        assert_eq!(result.error_kind, Some(ProbeErrorKind::ConnectionRefused));
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_dns_error() {
        let config = HealthCheckConfig {
            timeout_ms: 5000,
            ..Default::default()
        };
        let result = HealthProber::new()
            .probe("http://no-such-host.invalid", &config)
            .await;

        assert!(!result.healthy);
        assert_eq!(result.error_kind, Some(ProbeErrorKind::DnsError));
    }
}

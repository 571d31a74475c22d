//! Configuration schema for the node director.
//!
//! This module defines the complete configuration structure for the director.
//! Every section is optional in the TOML file; missing values take the defaults below.

use serde::{Deserialize, Serialize};

/// Root configuration for the node director.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DirectorConfig {
    /// Where clients reach the director.
    pub listener: ListenerConfig,

    /// Health probe settings.
    pub health_check: HealthCheckConfig,

    /// Per-origin throttle on the selection endpoint.
    pub throttle: ThrottleConfig,

    /// Client-facing request deadline.
    pub timeouts: TimeoutConfig,

    /// Node registry storage.
    pub registry: RegistryConfig,

    /// Credentials for write endpoints.
    pub auth: AuthConfig,

    /// Logging, metrics and activity history.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Public HTTP listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Serve HTTPS instead of plain HTTP when set.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// PEM files for the HTTPS listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Certificate chain, leaf first.
    pub cert_path: String,

    pub key_path: String,
}

/// How candidate health is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthMode {
    /// Probe every candidate over HTTP.
    #[default]
    Probe,
    /// Treat every candidate as healthy without probing.
    Simulate,
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub mode: HealthMode,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path appended to a node's url to reach its health surface.
    pub path: String,

    /// Nodes reporting disk usage at or above this percentage are unhealthy.
    pub max_disk_usage_percent: f64,

    /// Nodes reporting more overdue pins than this are unhealthy.
    pub max_overdue_pins: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            mode: HealthMode::Probe,
            timeout_ms: 5000,
            path: "/health".to_string(),
            max_disk_usage_percent: 90.0,
            max_overdue_pins: 0,
        }
    }
}

/// Request throttle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Enable throttling of the selection endpoint.
    pub enabled: bool,

    /// Admissions allowed per origin per window (inclusive).
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Origins (IP addresses) that bypass the counter.
    pub allow_list: Vec<String>,

    /// Key origins on the first `X-Forwarded-For` hop instead of the peer address.
    pub trust_forwarded_for: bool,

    /// Message returned with a 429.
    pub message: String,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 30,
            window_secs: 3600,
            allow_list: Vec::new(),
            trust_forwarded_for: false,
            message: "Too many requests from this IP. Maximum 30 video uploads per hour allowed."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds before an in-flight request is answered with 408.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Node registry storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON snapshot file. In-memory only when unset.
    pub persistence_path: Option<String>,
}

/// Write endpoint credentials.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret expected in `X-API-Secret` or `Authorization: Bearer`.
    /// Writes are refused while this is empty.
    pub api_secret: String,
}

/// Logging and metrics.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter level when `RUST_LOG` is unset.
    pub log_level: String,

    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    pub metrics_address: String,

    /// Number of activity events kept for `/api/activity`.
    pub activity_history: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            activity_history: 200,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Largest accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DirectorConfig = toml::from_str(
            r#"
            [throttle]
            max_requests = 5
            allow_list = ["10.0.0.1"]

            [health_check]
            mode = "simulate"
            "#,
        )
        .unwrap();

        assert_eq!(config.throttle.max_requests, 5);
        assert_eq!(config.throttle.window_secs, 3600);
        assert_eq!(config.throttle.allow_list, vec!["10.0.0.1".to_string()]);
        assert_eq!(config.health_check.mode, HealthMode::Simulate);
        assert_eq!(config.health_check.path, "/health");
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }
}

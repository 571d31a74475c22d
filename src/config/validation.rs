//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check throttle allow-list entries are IP addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DirectorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::DirectorConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &DirectorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    let health = &config.health_check;
    if health.timeout_ms == 0 {
        errors.push(ValidationError::new("health_check.timeout_ms", "must be > 0"));
    }
    if !health.path.starts_with('/') {
        errors.push(ValidationError::new("health_check.path", "must start with '/'"));
    }
    if !(health.max_disk_usage_percent > 0.0 && health.max_disk_usage_percent <= 100.0) {
        errors.push(ValidationError::new(
            "health_check.max_disk_usage_percent",
            "must be within (0, 100]",
        ));
    }

    let throttle = &config.throttle;
    if throttle.max_requests == 0 {
        errors.push(ValidationError::new("throttle.max_requests", "must be > 0"));
    }
    if throttle.window_secs == 0 {
        errors.push(ValidationError::new("throttle.window_secs", "must be > 0"));
    }
    for origin in &throttle.allow_list {
        if origin.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::new(
                "throttle.allow_list",
                format!("'{}' is not an IP address", origin),
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&DirectorConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = DirectorConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.throttle.max_requests = 0;
        config.throttle.allow_list = vec!["127.0.0.1".into(), "localhost".into()];
        config.health_check.max_disk_usage_percent = 150.0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "health_check.max_disk_usage_percent",
                "throttle.max_requests",
                "throttle.allow_list",
            ]
        );
    }
}

//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::DirectorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variable overriding `auth.api_secret`.
pub const ENV_API_SECRET: &str = "DIRECTOR_API_SECRET";
/// Environment variable overriding `listener.bind_address`.
pub const ENV_BIND_ADDRESS: &str = "DIRECTOR_BIND_ADDRESS";
/// Environment variable overriding `throttle.allow_list` (comma separated).
pub const ENV_THROTTLE_ALLOW_LIST: &str = "DIRECTOR_THROTTLE_ALLOW_LIST";

/// Load and validate configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<DirectorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: DirectorConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults and environment overrides only.
pub fn config_from_env() -> Result<DirectorConfig, ConfigError> {
    let mut config = DirectorConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment-provided values on top of a parsed config.
pub fn apply_env_overrides<F>(config: &mut DirectorConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(ENV_API_SECRET) {
        config.auth.api_secret = secret;
    }
    if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
    if let Some(list) = lookup(ENV_THROTTLE_ALLOW_LIST) {
        config.throttle.allow_list = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_SECRET, "s3cret"),
            (ENV_THROTTLE_ALLOW_LIST, "10.0.0.1, 10.0.0.2,,"),
        ]);
        let mut config = DirectorConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.auth.api_secret, "s3cret");
        assert_eq!(config.throttle.allow_list, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[throttle]\nwindow_secs = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "throttle.window_secs");
            }
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }
}

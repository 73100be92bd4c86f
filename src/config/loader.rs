//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variables that override file values.
///
/// Credentials belong here rather than in a checked-in file.
pub const ENV_OVERRIDES: &[&str] = &[
    "RELAY_BIND_ADDRESS",
    "RELAY_UPSTREAM_URL",
    "RELAY_APP_ID",
    "RELAY_ACCESS_KEY",
    "RELAY_RESOURCE_ID",
    "RELAY_APP_KEY",
];

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => RelayConfig::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Apply overrides from a variable lookup. Empty values are ignored.
pub fn apply_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for key in ENV_OVERRIDES {
        let Some(value) = lookup(key).filter(|v| !v.is_empty()) else {
            continue;
        };
        let slot = match *key {
            "RELAY_BIND_ADDRESS" => &mut config.listener.bind_address,
            "RELAY_UPSTREAM_URL" => &mut config.upstream.url,
            "RELAY_APP_ID" => &mut config.upstream.app_id,
            "RELAY_ACCESS_KEY" => &mut config.upstream.access_key,
            "RELAY_RESOURCE_ID" => &mut config.upstream.resource_id,
            "RELAY_APP_KEY" => &mut config.upstream.app_key,
            _ => continue,
        };
        tracing::debug!(variable = *key, "Applying environment override");
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_replace_file_values() {
        let mut config = RelayConfig::default();
        config.upstream.app_id = "from-file".into();

        let env: HashMap<&str, &str> = [
            ("RELAY_APP_ID", "from-env"),
            ("RELAY_ACCESS_KEY", "secret"),
            ("RELAY_APP_KEY", ""),
        ]
        .into_iter()
        .collect();
        apply_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.upstream.app_id, "from-env");
        assert_eq!(config.upstream.access_key, "secret");
        assert!(config.upstream.app_key.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = ConfigError::Validation(vec![
            ValidationError::ZeroMaxSessions,
            ValidationError::ZeroHandshakeTimeout,
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: listener.max_sessions must be greater than zero, \
             upstream.handshake_timeout_secs must be greater than zero"
        );
    }
}

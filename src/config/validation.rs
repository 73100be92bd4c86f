//! Configuration validation.
//!
//! Serde handles syntax; this checks values. All errors are collected so a
//! bad config file can be fixed in one pass.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.max_sessions must be greater than zero")]
    ZeroMaxSessions,

    #[error("upstream.url '{url}' is invalid: {reason}")]
    UpstreamUrl { url: String, reason: String },

    #[error("upstream.{0} must not be empty")]
    MissingCredential(&'static str),

    #[error("upstream.handshake_timeout_secs must be greater than zero")]
    ZeroHandshakeTimeout,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_sessions == 0 {
        errors.push(ValidationError::ZeroMaxSessions);
    }

    let upstream = &config.upstream;
    match url::Url::parse(&upstream.url) {
        Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => {}
        Ok(parsed) => errors.push(ValidationError::UpstreamUrl {
            url: upstream.url.clone(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        }),
        Err(e) => errors.push(ValidationError::UpstreamUrl {
            url: upstream.url.clone(),
            reason: e.to_string(),
        }),
    }

    for (name, value) in [
        ("app_id", &upstream.app_id),
        ("access_key", &upstream.access_key),
        ("resource_id", &upstream.resource_id),
        ("app_key", &upstream.app_key),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::MissingCredential(name));
        }
    }

    if upstream.handshake_timeout_secs == 0 {
        errors.push(ValidationError::ZeroHandshakeTimeout);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

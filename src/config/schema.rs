//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Default remote realtime dialogue endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "wss://openspeech.bytedance.com/api/v3/realtime/dialogue";

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, session limit).
    pub listener: ListenerConfig,

    /// Remote endpoint and the credentials injected into every upstream handshake.
    pub upstream: UpstreamConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Port the listener is configured on, if the bind address parses.
    pub fn ws_port(&self) -> Option<u16> {
        self.listener
            .bind_address
            .parse::<std::net::SocketAddr>()
            .ok()
            .map(|addr| addr.port())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8765").
    pub bind_address: String,

    /// Maximum concurrent sessions. Upgrades beyond this are rejected.
    pub max_sessions: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8765".to_string(),
            max_sessions: 1024,
        }
    }
}

/// Upstream (remote dialogue service) configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// WebSocket endpoint URL (`ws://` or `wss://`).
    pub url: String,

    /// Application identifier, sent as `X-Api-App-ID`.
    pub app_id: String,

    /// Access key, sent as `X-Api-Access-Key`.
    pub access_key: String,

    /// Resource identifier, sent as `X-Api-Resource-Id`.
    pub resource_id: String,

    /// Application key, sent as `X-Api-App-Key`.
    pub app_key: String,

    /// Upper bound on the outbound handshake in seconds.
    pub handshake_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            app_id: String::new(),
            access_key: String::new(),
            resource_id: "volc.speech.dialog".to_string(),
            app_key: String::new(),
            handshake_timeout_secs: 10,
        }
    }
}

// Credentials never reach logs through `{:?}`.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("app_id", &self.app_id)
            .field("access_key", &redacted(&self.access_key))
            .field("resource_id", &self.resource_id)
            .field("app_key", &redacted(&self.app_key))
            .field("handshake_timeout_secs", &self.handshake_timeout_secs)
            .finish()
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for live sessions to drain, in seconds.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output style.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Render a credential for display: a short prefix followed by `...`.
pub fn redacted(secret: &str) -> String {
    const VISIBLE: usize = 4;
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let prefix: String = secret.chars().take(VISIBLE).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_dialogue_endpoint() {
        let config = RelayConfig::default();
        assert_eq!(config.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.upstream.resource_id, "volc.speech.dialog");
        assert_eq!(config.upstream.handshake_timeout_secs, 10);
        assert_eq!(config.ws_port(), Some(8765));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [upstream]
            app_id = "app"
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.app_id, "app");
        assert_eq!(config.upstream.resource_id, "volc.speech.dialog");
        assert_eq!(config.listener.max_sessions, 1024);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn debug_output_hides_credentials() {
        let mut upstream = UpstreamConfig::default();
        upstream.access_key = "tRDp6c2pMhqtMXWY".into();
        upstream.app_key = "PlgvMymc7f3tQnJ6".into();
        let rendered = format!("{:?}", upstream);
        assert!(!rendered.contains("tRDp6c2pMhqtMXWY"));
        assert!(!rendered.contains("PlgvMymc7f3tQnJ6"));
        assert!(rendered.contains("tRDp..."));
    }

    #[test]
    fn redacted_handles_short_and_empty() {
        assert_eq!(redacted(""), "<unset>");
        assert_eq!(redacted("ab"), "ab...");
    }
}

//! Structured logging.
//!
//! `RUST_LOG` takes precedence over the configured level so a single run
//! can be made noisier without editing the config file.

use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> String {
    format!("voice_relay={level},relay_cli={level},tower_http=info")
}

/// Build the subscriber for `config` without installing it.
pub fn subscriber(config: &ObservabilityConfig) -> Box<dyn Subscriber + Send + Sync> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Pretty => Box::new(registry.with(tracing_subscriber::fmt::layer())),
        LogFormat::Compact => Box::new(registry.with(tracing_subscriber::fmt::layer().compact())),
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    if let Err(e) = subscriber(config).try_init() {
        tracing::debug!(error = %e, "Logging already initialized");
    }
}

//! Voice dialogue relay.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser client                 RELAY                      Dialogue service
//!                      ┌─────────────────────────────────┐
//!   ws://host:8765 ───▶│ http::server ─▶ relay::Session  │
//!                      │                 │  inbound leg   │
//!                      │                 │  outbound leg ─┼──▶ wss://... + credential headers
//!   frames  ◀─────────▶│ verbatim relay ◀┘                │◀──▶ frames
//!                      │                                  │
//!                      │ GET /status  GET /  404          │
//!                      │ config  observability  lifecycle │
//!                      └─────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use voice_relay::config::{load_config, redacted};
use voice_relay::lifecycle::{termination_signal, Shutdown};
use voice_relay::observability::{logging, metrics};
use voice_relay::RelayServer;

#[derive(Parser)]
#[command(name = "voice-relay")]
#[command(about = "WebSocket relay for the voice dialogue service", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults plus RELAY_* env vars when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!("voice-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        app_id = %config.upstream.app_id,
        access_key = %redacted(&config.upstream.access_key),
        resource_id = %config.upstream.resource_id,
        "Configuration loaded"
    );

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("TLS crypto provider already installed");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        termination_signal().await;
        signal.trigger();
    });

    let server = RelayServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

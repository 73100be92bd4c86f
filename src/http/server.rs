//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Accept WebSocket upgrades on any path and start a session for each
//! - Serve the status endpoint and informational page
//! - On shutdown: stop accepting, close every session, wait for the drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{future, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::{redacted, RelayConfig};
use crate::http::status;
use crate::relay::leg::{self, LegHandle};
use crate::relay::{Registration, Session, SessionId, SessionRegistry, Upstream};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub registry: SessionRegistry,
    pub upstream: Arc<Upstream>,
}

/// HTTP + WebSocket server for the relay.
pub struct RelayServer {
    router: Router,
    state: AppState,
}

impl RelayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let upstream = Arc::new(Upstream::new(config.upstream.clone()));
        let state = AppState {
            config: Arc::new(config),
            registry: SessionRegistry::new(),
            upstream,
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", get(index_handler))
            .route("/status", get(status::status_handler))
            .fallback(fallback_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Handle to the live-session registry.
    pub fn registry(&self) -> SessionRegistry {
        self.state.registry.clone()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.state.config
    }

    /// Run the server until `shutdown` fires, then close all sessions and
    /// wait (bounded) for them to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let config = Arc::clone(&self.state.config);
        tracing::info!(
            address = %addr,
            upstream = %config.upstream.url,
            app_id = %config.upstream.app_id,
            access_key = %redacted(&config.upstream.access_key),
            max_sessions = config.listener.max_sessions,
            "Relay server starting"
        );

        let registry = self.state.registry.clone();
        let closing = registry.clone();
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, closing sessions");
                closing.close_all();
            })
            .await?;

        let grace = Duration::from_secs(config.shutdown.grace_secs);
        if registry.wait_for_drain(grace).await {
            tracing::info!("All sessions closed");
        }

        tracing::info!("Relay server stopped");
        Ok(())
    }
}

/// `GET /`: WebSocket upgrade, or the informational page.
async fn index_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => accept_session(state, ws, peer),
        Err(_) => status::index_page(&state.config).into_response(),
    }
}

/// Any other path: WebSocket upgrade, or 404.
async fn fallback_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => accept_session(state, ws, peer),
        Err(_) => status::not_found(),
    }
}

fn accept_session(state: AppState, ws: WebSocketUpgrade, peer: SocketAddr) -> Response {
    let limit = state.config.listener.max_sessions;
    let registration = match state.registry.try_register(SessionId::new(), Some(peer), limit) {
        Ok(registration) => registration,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "Rejecting upgrade");
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    // If the upgrade never completes the callback is dropped, and the
    // registration with it.
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(peer = %peer, error = %e, "Client upgrade failed");
    })
    .on_upgrade(move |socket| relay_session(state, socket, registration))
}

async fn relay_session(state: AppState, socket: WebSocket, registration: Registration) {
    let (sink, stream) = socket.split();
    let inbound = LegHandle::spawn(sink, leg::client_message, leg::client_close);

    let grace = Duration::from_secs(state.config.shutdown.grace_secs);
    let session = Session::create(registration, inbound, grace);

    let upstream = Arc::clone(&state.upstream);
    let connect_id = session.id();
    let connect = async move { upstream.connect(connect_id).await };

    let events = stream.filter_map(|message| future::ready(leg::client_event(message)));
    session.run(events, connect).await;
}

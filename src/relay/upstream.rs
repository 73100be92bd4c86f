//! Outbound connection to the remote dialogue service.
//!
//! # Responsibilities
//! - Build the handshake request with the credential headers the client
//!   never sees
//! - Bound the handshake with a timeout
//! - Split the connected socket into a writer-backed [`LegHandle`] and a
//!   stream of [`LegEvent`]s

use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::{future, StreamExt};
use thiserror::Error;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::config::UpstreamConfig;
use crate::relay::leg::{self, LegEvent, LegHandle};
use crate::relay::session::SessionId;

pub const HEADER_APP_ID: &str = "x-api-app-id";
pub const HEADER_ACCESS_KEY: &str = "x-api-access-key";
pub const HEADER_RESOURCE_ID: &str = "x-api-resource-id";
pub const HEADER_APP_KEY: &str = "x-api-app-key";
pub const HEADER_CONNECT_ID: &str = "x-api-connect-id";

/// Errors opening the upstream leg.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The configured URL could not be turned into a handshake request.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(#[source] WsError),

    /// A configured value is not a legal header value.
    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// TCP, TLS, or WebSocket handshake failure, including HTTP rejections.
    #[error("upstream handshake failed: {0}")]
    Handshake(#[from] WsError),

    /// The handshake did not finish in time.
    #[error("upstream handshake timed out after {0} seconds")]
    HandshakeTimeout(u64),
}

impl UpstreamError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            UpstreamError::InvalidRequest(_) | UpstreamError::InvalidHeader(_) => "invalid_request",
            UpstreamError::Handshake(WsError::Http(_)) => "rejected",
            UpstreamError::Handshake(_) => "handshake",
            UpstreamError::HandshakeTimeout(_) => "timeout",
        }
    }
}

/// Events read from the upstream leg.
pub type UpstreamEvents = BoxStream<'static, LegEvent>;

/// Opens upstream legs with the configured endpoint and credentials.
#[derive(Debug, Clone)]
pub struct Upstream {
    config: UpstreamConfig,
}

impl Upstream {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.config.handshake_timeout_secs)
    }

    /// Handshake request for one session, credentials attached.
    pub fn request(&self, connect_id: SessionId) -> Result<Request, UpstreamError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(UpstreamError::InvalidRequest)?;

        let connect_id = connect_id.to_string();
        let headers = [
            (HEADER_APP_ID, self.config.app_id.as_str()),
            (HEADER_ACCESS_KEY, self.config.access_key.as_str()),
            (HEADER_RESOURCE_ID, self.config.resource_id.as_str()),
            (HEADER_APP_KEY, self.config.app_key.as_str()),
            (HEADER_CONNECT_ID, connect_id.as_str()),
        ];
        for (name, value) in headers {
            let value = HeaderValue::from_str(value).map_err(|_| UpstreamError::InvalidHeader(name))?;
            request
                .headers_mut()
                .insert(HeaderName::from_static(name), value);
        }

        Ok(request)
    }

    /// Open the upstream leg for `connect_id`.
    pub async fn connect(
        &self,
        connect_id: SessionId,
    ) -> Result<(LegHandle, UpstreamEvents), UpstreamError> {
        let request = self.request(connect_id)?;
        let timeout = self.handshake_timeout();

        tracing::debug!(session_id = %connect_id, url = %self.config.url, "Opening upstream connection");

        let (socket, response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| UpstreamError::HandshakeTimeout(self.config.handshake_timeout_secs))??;

        tracing::debug!(
            session_id = %connect_id,
            status = %response.status(),
            "Upstream handshake complete"
        );

        let (sink, stream) = socket.split();
        let handle = LegHandle::spawn(sink, leg::upstream_message, leg::upstream_close);
        let events = stream
            .filter_map(|message| future::ready(leg::upstream_event(message)))
            .boxed();

        Ok((handle, events))
    }
}

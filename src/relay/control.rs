//! Control messages the relay itself sends to the client.
//!
//! These are UTF-8 JSON text frames of the shape
//! `{"type": "proxy_connected" | "proxy_error", ...}`. They only ever travel
//! to the client leg and are never relayed upstream.

use serde::{Deserialize, Serialize};

use crate::relay::leg::Frame;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// The upstream handshake completed; relayed frames follow.
    ProxyConnected { message: String, connect_id: String },
    /// The upstream leg failed; the client connection closes next.
    ProxyError { error: String },
}

impl ControlMessage {
    pub fn connected(connect_id: impl Into<String>) -> Self {
        Self::ProxyConnected {
            message: "Relay connected to the dialogue service".to_string(),
            connect_id: connect_id.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::ProxyError {
            error: error.into(),
        }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> Frame {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize control message");
            String::from(r#"{"type":"proxy_error","error":"internal"}"#)
        });
        Frame::Text(json)
    }
}

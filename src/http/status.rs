//! Status and informational endpoints.
//!
//! - `GET /status` → JSON with the live session count and a config echo
//! - `GET /` (no upgrade) → static HTML page
//! - anything else → `404 Not Found`

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::RelayConfig;
use crate::http::server::AppState;

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
    pub connections: usize,
    pub config: ConfigEcho,
}

/// Non-secret configuration shown on the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub app_id: String,
    pub ws_port: Option<u16>,
}

impl StatusBody {
    pub fn new(config: &RelayConfig, connections: usize) -> Self {
        Self {
            status: "running".to_string(),
            connections,
            config: ConfigEcho {
                app_id: config.upstream.app_id.clone(),
                ws_port: config.ws_port(),
            },
        }
    }
}

pub async fn status_handler(State(state): State<AppState>) -> Json<StatusBody> {
    Json(StatusBody::new(&state.config, state.registry.len()))
}

pub fn index_page(config: &RelayConfig) -> Html<String> {
    let port = config
        .ws_port()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "?".to_string());
    let app_id = escape_html(&config.upstream.app_id);

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Voice Dialogue Relay</title>
    <style>
        body {{ font-family: sans-serif; margin: 40px; }}
        .info {{ background: #e8f5e8; padding: 20px; border-radius: 8px; margin: 20px 0; }}
        .usage {{ background: #fff3e0; padding: 20px; border-radius: 8px; margin: 20px 0; }}
        code {{ background: #f0f0f0; padding: 2px 6px; border-radius: 3px; }}
    </style>
</head>
<body>
    <h1>Voice Dialogue Relay</h1>
    <div class="info">
        <h2>Service status</h2>
        <p>Relay is running.</p>
        <p>WebSocket port: <code>{port}</code></p>
        <p>App ID: <code>{app_id}</code></p>
    </div>
    <div class="usage">
        <h2>Usage</h2>
        <p>Point the browser client at <code>ws://localhost:{port}</code>.</p>
        <p>Credentials are attached by the relay; the client sends none.</p>
        <p>The first message on a new connection is a <code>proxy_connected</code> notice.</p>
    </div>
    <div class="info">
        <h2>Endpoints</h2>
        <p>WebSocket: <code>ws://localhost:{port}</code></p>
        <p>Status: <code>http://localhost:{port}/status</code></p>
    </div>
</body>
</html>
"#
    ))
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_body_shape() {
        let mut config = RelayConfig::default();
        config.upstream.app_id = "7059594059".into();
        config.upstream.access_key = "secret-access-key".into();

        let json = serde_json::to_value(StatusBody::new(&config, 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "running",
                "connections": 3,
                "config": {"app_id": "7059594059", "ws_port": 8765}
            })
        );
        assert!(!json.to_string().contains("secret"));
    }

    #[test]
    fn index_page_escapes_app_id() {
        let mut config = RelayConfig::default();
        config.upstream.app_id = "<script>".into();
        let Html(page) = index_page(&config);
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("ws://localhost:8765"));
    }
}

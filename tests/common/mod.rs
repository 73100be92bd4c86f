//! Shared utilities for relay integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderMap, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use voice_relay::config::RelayConfig;
use voice_relay::lifecycle::Shutdown;
use voice_relay::relay::SessionRegistry;
use voice_relay::RelayServer;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const STEP: Duration = Duration::from_secs(5);

/// How the mock dialogue service treats each connection.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Echo every data frame back.
    Echo,
    /// Send these frames right after the handshake, then echo.
    Burst(Vec<Message>),
    /// Refuse the handshake with this HTTP status.
    Reject(u16),
    /// Accept the TCP connection and never answer the handshake.
    Hang,
    /// Complete the handshake, then close with 1000 "bye".
    Close,
}

/// What the mock dialogue service observed.
#[derive(Debug)]
pub enum Seen {
    Connected(HeaderMap),
    Message(Message),
    Disconnected,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub seen: mpsc::UnboundedReceiver<Seen>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("ws://{}/api/v3/realtime/dialogue", self.addr)
    }

    pub async fn next_seen(&mut self) -> Seen {
        tokio::time::timeout(STEP, self.seen.recv())
            .await
            .expect("mock upstream saw nothing")
            .expect("mock upstream stopped")
    }

    pub async fn handshake_headers(&mut self) -> HeaderMap {
        match self.next_seen().await {
            Seen::Connected(headers) => headers,
            other => panic!("expected handshake, got {:?}", other),
        }
    }

    pub async fn next_message(&mut self) -> Message {
        loop {
            match self.next_seen().await {
                Seen::Message(message) => return message,
                Seen::Connected(_) => continue,
                Seen::Disconnected => panic!("upstream disconnected before a message"),
            }
        }
    }

    /// Wait for the relay to hang up; returns whether a close frame came first.
    pub async fn wait_disconnected(&mut self) -> bool {
        let mut close_frame = false;
        loop {
            match self.next_seen().await {
                Seen::Message(Message::Close(_)) => close_frame = true,
                Seen::Disconnected => return close_frame,
                _ => {}
            }
        }
    }
}

/// Start a mock dialogue service on an ephemeral port.
pub async fn start_mock_upstream(behavior: Behavior) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, seen) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_upstream(stream, behavior.clone(), tx.clone()));
        }
    });

    MockUpstream { addr, seen }
}

async fn serve_upstream(stream: TcpStream, behavior: Behavior, tx: mpsc::UnboundedSender<Seen>) {
    if let Behavior::Hang = behavior {
        let _held = stream;
        tokio::time::sleep(Duration::from_secs(60)).await;
        return;
    }

    let reject = match behavior {
        Behavior::Reject(code) => Some(code),
        _ => None,
    };
    let headers_tx = tx.clone();
    let callback = move |request: &Request, response: Response| {
        let _ = headers_tx.send(Seen::Connected(request.headers().clone()));
        match reject {
            Some(code) => {
                let mut refusal = ErrorResponse::new(Some("unauthorized".to_string()));
                *refusal.status_mut() = StatusCode::from_u16(code).unwrap();
                Err(refusal)
            }
            None => Ok(response),
        }
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    match &behavior {
        Behavior::Burst(frames) => {
            for frame in frames {
                if ws.send(frame.clone()).await.is_err() {
                    return;
                }
            }
        }
        Behavior::Close => {
            let _ = ws
                .close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "bye".into(),
                }))
                .await;
        }
        _ => {}
    }

    let echo = matches!(behavior, Behavior::Echo | Behavior::Burst(_));
    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            Message::Close(_) => {
                let _ = tx.send(Seen::Message(message));
            }
            data => {
                let _ = tx.send(Seen::Message(data.clone()));
                if echo && ws.send(data).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = tx.send(Seen::Disconnected);
}

/// Relay config pointing at `upstream` with test credentials.
pub fn relay_config(upstream: &MockUpstream) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.upstream.url = upstream.url();
    config.upstream.app_id = "test-app".into();
    config.upstream.access_key = "test-access-key".into();
    config.upstream.app_key = "test-app-key".into();
    config.upstream.handshake_timeout_secs = 2;
    config.shutdown.grace_secs = 1;
    config
}

pub struct TestRelay {
    pub addr: SocketAddr,
    pub registry: SessionRegistry,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestRelay {
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Run a relay on an ephemeral port.
pub async fn start_relay(mut config: RelayConfig) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let server = RelayServer::new(config);
    let registry = server.registry();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestRelay {
        addr,
        registry,
        shutdown,
        handle,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn get(url: String) -> reqwest::Result<reqwest::Response> {
    http_client().get(url).send().await
}

pub async fn connect_client(url: &str) -> Client {
    let (ws, _) = tokio::time::timeout(STEP, tokio_tungstenite::connect_async(url))
        .await
        .expect("client connect timed out")
        .expect("client connect failed");
    ws
}

/// Next non-control message from the relay, or `None` once closed.
pub async fn next_data(ws: &mut Client) -> Option<Message> {
    loop {
        let next = tokio::time::timeout(STEP, ws.next())
            .await
            .expect("relay sent nothing");
        match next {
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(message)) => return Some(message),
        }
    }
}

pub fn parse_control(message: &Message) -> serde_json::Value {
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text control message, got {:?}", other),
    }
}

/// Read the `proxy_connected` acknowledgement and return its connect id.
pub async fn expect_connected(ws: &mut Client) -> String {
    let ack = next_data(ws).await.expect("closed before acknowledgement");
    let json = parse_control(&ack);
    assert_eq!(json["type"], "proxy_connected");
    json["connect_id"].as_str().unwrap().to_string()
}

/// Drain until the relay closes the connection; returns data seen on the way.
pub async fn expect_closed(ws: &mut Client) -> Vec<Message> {
    let mut seen = Vec::new();
    while let Some(message) = next_data(ws).await {
        seen.push(message);
    }
    seen
}

/// Poll `check` until it holds or the step timeout passes.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + STEP;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// A binary frame with a 4-byte protocol header and an event id.
pub fn dialogue_frame(event_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x11, 0x14, 0x10, 0x00];
    frame.extend_from_slice(&event_id.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

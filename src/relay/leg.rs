//! One side of a session and its transport boundary.
//!
//! Each leg is split into a read half, turned into a stream of [`LegEvent`]s
//! consumed by the session, and a write half owned by a writer task that
//! drains a queue of [`Outgoing`] commands. Sends from the session never
//! block: they are queued in order and the writer task performs the I/O.

use std::fmt::Display;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use axum::extract::ws::Message as ClientMessage;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// A relayed message, tagged by payload kind at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Binary(Bytes),
    Text(String),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Binary(bytes) => bytes.len(),
            Frame::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something that happened on a leg's read half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegEvent {
    Message(Frame),
    Closed { code: Option<u16>, reason: String },
    Error(String),
}

/// Command queued to a leg's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Frame(Frame),
    Close,
}

/// Which leg a frame travelled on, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → upstream.
    Inbound,
    /// Upstream → client.
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "client_to_upstream",
            Direction::Outbound => "upstream_to_client",
        }
    }
}

/// Write handle for one leg.
///
/// The leg counts as open until the session closes it or the peer is seen
/// to have gone away. Closing is idempotent.
#[derive(Debug)]
pub struct LegHandle {
    tx: Option<mpsc::UnboundedSender<Outgoing>>,
    writer: Option<JoinHandle<()>>,
}

impl LegHandle {
    /// A handle with no writer task; the caller owns the receiving end.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx),
                writer: None,
            },
            rx,
        )
    }

    /// Spawn a writer task that drives `sink` from this handle's queue.
    pub fn spawn<S, M>(sink: S, encode: fn(Frame) -> M, close: fn() -> M) -> Self
    where
        S: Sink<M> + Unpin + Send + 'static,
        S::Error: Display,
        M: Send + 'static,
    {
        let (mut handle, rx) = Self::detached();
        handle.writer = Some(tokio::spawn(drive_writer(rx, sink, encode, close)));
        handle
    }

    pub fn is_open(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Queue a frame. Returns `false` and drops the frame if the leg is closed.
    pub fn send(&mut self, frame: Frame) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        if tx.send(Outgoing::Frame(frame)).is_err() {
            self.tx = None;
            return false;
        }
        true
    }

    /// Ask the writer to send a close frame. No-op if already closed.
    pub fn close(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Outgoing::Close);
        }
    }

    /// The peer closed the connection; stop accepting frames without
    /// sending our own close frame.
    pub fn mark_peer_closed(&mut self) {
        self.tx = None;
    }

    /// Wait up to `grace` for the writer task to flush and exit.
    pub async fn finish(&mut self, grace: Duration) {
        self.tx = None;
        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(grace, writer).await.is_err() {
                tracing::debug!("Leg writer did not finish within grace period");
            }
        }
    }
}

async fn drive_writer<S, M>(
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    mut sink: S,
    encode: fn(Frame) -> M,
    close: fn() -> M,
) where
    S: Sink<M> + Unpin,
    S::Error: Display,
{
    while let Some(command) = rx.recv().await {
        match command {
            Outgoing::Frame(frame) => {
                if let Err(e) = sink.send(encode(frame)).await {
                    tracing::debug!(error = %e, "Leg write failed");
                    break;
                }
            }
            Outgoing::Close => {
                let _ = sink.send(close()).await;
                break;
            }
        }
    }
    // Frames queued after a failure are dropped with the receiver.
    rx.close();
    let _ = sink.close().await;
}

// ── Client-facing (axum) adapters ──

pub fn client_event(message: Result<ClientMessage, axum::Error>) -> Option<LegEvent> {
    match message {
        Ok(ClientMessage::Binary(bytes)) => Some(LegEvent::Message(Frame::Binary(bytes))),
        Ok(ClientMessage::Text(text)) => {
            Some(LegEvent::Message(Frame::Text(text.as_str().to_owned())))
        }
        Ok(ClientMessage::Close(frame)) => Some(match frame {
            Some(frame) => LegEvent::Closed {
                code: Some(frame.code),
                reason: frame.reason.as_str().to_owned(),
            },
            None => LegEvent::Closed {
                code: None,
                reason: String::new(),
            },
        }),
        Ok(ClientMessage::Ping(_)) | Ok(ClientMessage::Pong(_)) => None,
        Err(e) => Some(LegEvent::Error(e.to_string())),
    }
}

pub fn client_message(frame: Frame) -> ClientMessage {
    match frame {
        Frame::Binary(bytes) => ClientMessage::Binary(bytes),
        Frame::Text(text) => ClientMessage::Text(text.into()),
    }
}

pub fn client_close() -> ClientMessage {
    ClientMessage::Close(None)
}

// ── Upstream (tungstenite) adapters ──

pub fn upstream_event(
    message: Result<UpstreamMessage, tokio_tungstenite::tungstenite::Error>,
) -> Option<LegEvent> {
    match message {
        Ok(UpstreamMessage::Binary(bytes)) => Some(LegEvent::Message(Frame::Binary(bytes))),
        Ok(UpstreamMessage::Text(text)) => {
            Some(LegEvent::Message(Frame::Text(text.as_str().to_owned())))
        }
        Ok(UpstreamMessage::Close(frame)) => Some(match frame {
            Some(frame) => LegEvent::Closed {
                code: Some(u16::from(frame.code)),
                reason: frame.reason.as_str().to_owned(),
            },
            None => LegEvent::Closed {
                code: None,
                reason: String::new(),
            },
        }),
        Ok(UpstreamMessage::Ping(_))
        | Ok(UpstreamMessage::Pong(_))
        | Ok(UpstreamMessage::Frame(_)) => None,
        Err(e) => Some(LegEvent::Error(e.to_string())),
    }
}

pub fn upstream_message(frame: Frame) -> UpstreamMessage {
    match frame {
        Frame::Binary(bytes) => UpstreamMessage::Binary(bytes),
        Frame::Text(text) => UpstreamMessage::Text(text.into()),
    }
}

pub fn upstream_close() -> UpstreamMessage {
    UpstreamMessage::Close(None)
}

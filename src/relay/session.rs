//! A relayed session: one client leg paired with one upstream leg.
//!
//! # State Transitions
//! ```text
//! Connecting ──upstream open──▶ Active ──either leg ends──▶ Closing ──writers flushed──▶ Closed
//!      │                                                       ▲
//!      └──handshake error / timeout / client gone / shutdown───┘
//! ```
//!
//! Every transport event is delivered to exactly one `on_*` method. All of
//! them run on the session's own task, so the session's state needs no
//! locking. Events from the client leg only act on the upstream leg and vice
//! versa, except that the relay's own control messages go to the client.

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame::FrameHeader;
use crate::observability::metrics;
use crate::relay::control::ControlMessage;
use crate::relay::leg::{Direction, Frame, LegEvent, LegHandle};
use crate::relay::registry::{Registration, SessionCommand, SessionGuard};
use crate::relay::upstream::UpstreamError;

/// Per-session connect id, sent upstream as `X-Api-Connect-Id` and used to
/// correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upstream handshake in flight.
    Connecting,
    /// Both legs open; frames relay freely.
    Active,
    /// Teardown started; close frames queued on both legs.
    Closing,
    /// Both legs closed and the session has left the registry.
    Closed,
}

/// Frame and byte counters, per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_in: u64,
    pub bytes_in: u64,
    pub frames_out: u64,
    pub bytes_out: u64,
    pub dropped: u64,
}

pub struct Session {
    id: SessionId,
    state: SessionState,
    inbound: LegHandle,
    outbound: Option<LegHandle>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    stats: SessionStats,
    peer: Option<SocketAddr>,
    created_at: Instant,
    close_grace: Duration,
    _guard: SessionGuard,
}

impl Session {
    /// Create a session for a freshly accepted client connection, in the
    /// registry slot reserved for it. The upstream leg is opened by
    /// [`Session::run`].
    pub fn create(registration: Registration, inbound: LegHandle, close_grace: Duration) -> Self {
        let Registration {
            guard,
            peer,
            commands,
        } = registration;
        let id = guard.id();

        tracing::info!(
            session_id = %id,
            peer = ?peer,
            "Session created, connecting upstream"
        );

        Self {
            id,
            state: SessionState::Connecting,
            inbound,
            outbound: None,
            commands,
            stats: SessionStats::default(),
            peer,
            created_at: Instant::now(),
            close_grace,
            _guard: guard,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// True once teardown has started.
    pub fn is_terminating(&self) -> bool {
        matches!(self.state, SessionState::Closing | SessionState::Closed)
    }

    /// Drive the session to completion.
    ///
    /// `connect` opens the upstream leg; `inbound` yields client events.
    pub async fn run<I, C, O>(mut self, mut inbound: I, connect: C)
    where
        I: Stream<Item = LegEvent> + Unpin,
        C: Future<Output = Result<(LegHandle, O), UpstreamError>>,
        O: Stream<Item = LegEvent> + Unpin,
    {
        tokio::pin!(connect);

        let outbound_events = loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok((leg, events)) => {
                        self.on_outbound_open(leg);
                        break Some(events);
                    }
                    Err(e) => {
                        metrics::record_upstream_failure(e.reason());
                        self.on_outbound_error(&e.to_string());
                        break None;
                    }
                },
                event = inbound.next() => {
                    self.on_inbound_event(event);
                    if self.is_terminating() {
                        break None;
                    }
                }
                Some(command) = self.commands.recv() => {
                    self.on_command(command);
                    if self.is_terminating() {
                        break None;
                    }
                }
            }
        };

        if let Some(mut outbound) = outbound_events {
            while !self.is_terminating() {
                tokio::select! {
                    event = inbound.next() => self.on_inbound_event(event),
                    event = outbound.next() => self.on_outbound_event(event),
                    Some(command) = self.commands.recv() => self.on_command(command),
                }
            }
        }

        self.finish().await;
    }

    fn on_inbound_event(&mut self, event: Option<LegEvent>) {
        match event {
            Some(LegEvent::Message(frame)) => self.on_inbound_message(frame),
            Some(LegEvent::Closed { code, reason }) => {
                tracing::debug!(session_id = %self.id, code = ?code, reason = %reason, "Client sent close");
                self.on_inbound_close();
            }
            Some(LegEvent::Error(error)) => self.on_inbound_error(&error),
            None => self.on_inbound_close(),
        }
    }

    fn on_outbound_event(&mut self, event: Option<LegEvent>) {
        match event {
            Some(LegEvent::Message(frame)) => self.on_outbound_message(frame),
            Some(LegEvent::Closed { code, reason }) => self.on_outbound_close(code, &reason),
            Some(LegEvent::Error(error)) => self.on_outbound_error(&error),
            None => self.on_outbound_close(None, ""),
        }
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Shutdown => {
                tracing::info!(session_id = %self.id, "Shutdown requested, closing client leg");
                self.teardown("shutdown");
            }
        }
    }

    /// Upstream handshake completed.
    pub fn on_outbound_open(&mut self, outbound: LegHandle) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.outbound = Some(outbound);
        self.state = SessionState::Active;

        tracing::info!(
            session_id = %self.id,
            handshake_ms = self.created_at.elapsed().as_millis() as u64,
            "Connected to upstream"
        );

        let ack = ControlMessage::connected(self.id.to_string()).to_frame();
        if !self.inbound.send(ack) {
            tracing::debug!(session_id = %self.id, "Client gone before acknowledgement");
        }
    }

    /// Frame from upstream, forwarded verbatim to the client.
    pub fn on_outbound_message(&mut self, frame: Frame) {
        if self.is_terminating() {
            return;
        }
        self.describe(Direction::Outbound, &frame);
        self.stats.frames_out += 1;
        self.stats.bytes_out += frame.len() as u64;

        if !self.inbound.send(frame) {
            self.stats.dropped += 1;
            tracing::trace!(session_id = %self.id, "Client leg closed, dropping frame");
        }
    }

    /// Frame from the client, forwarded verbatim upstream.
    pub fn on_inbound_message(&mut self, frame: Frame) {
        if self.is_terminating() {
            return;
        }
        self.describe(Direction::Inbound, &frame);
        self.stats.frames_in += 1;
        self.stats.bytes_in += frame.len() as u64;

        let sent = match self.outbound.as_mut() {
            Some(outbound) => outbound.send(frame),
            None => false,
        };
        if !sent {
            self.stats.dropped += 1;
            tracing::debug!(
                session_id = %self.id,
                state = ?self.state,
                "Upstream leg not open, dropping frame"
            );
        }
    }

    /// Upstream failed (handshake error, timeout, or transport error).
    pub fn on_outbound_error(&mut self, error: &str) {
        if self.is_terminating() {
            return;
        }
        tracing::error!(session_id = %self.id, error = %error, "Upstream error");

        if let Some(outbound) = self.outbound.as_mut() {
            outbound.mark_peer_closed();
        }
        self.inbound.send(ControlMessage::error(error).to_frame());
        self.teardown("upstream_error");
    }

    /// Upstream closed the connection.
    pub fn on_outbound_close(&mut self, code: Option<u16>, reason: &str) {
        if self.is_terminating() {
            return;
        }
        tracing::info!(
            session_id = %self.id,
            code = ?code,
            reason = %reason,
            "Upstream closed connection"
        );
        if let Some(outbound) = self.outbound.as_mut() {
            outbound.mark_peer_closed();
        }
        self.teardown("upstream_closed");
    }

    /// Client closed the connection.
    pub fn on_inbound_close(&mut self) {
        if self.is_terminating() {
            return;
        }
        tracing::info!(session_id = %self.id, "Client disconnected");
        self.inbound.mark_peer_closed();
        self.teardown("client_closed");
    }

    /// Client transport error. Logged only; the client stream ends right
    /// after, and that close drives teardown.
    pub fn on_inbound_error(&mut self, error: &str) {
        tracing::warn!(session_id = %self.id, error = %error, "Client error");
    }

    fn teardown(&mut self, cause: &'static str) {
        if self.is_terminating() {
            return;
        }
        self.state = SessionState::Closing;
        self.inbound.close();
        if let Some(outbound) = self.outbound.as_mut() {
            outbound.close();
        }
        tracing::debug!(session_id = %self.id, cause, "Session closing");
    }

    /// Wait (bounded) for both writers to flush, then leave the registry.
    async fn finish(mut self) {
        self.teardown("finished");

        self.inbound.finish(self.close_grace).await;
        if let Some(outbound) = self.outbound.as_mut() {
            outbound.finish(self.close_grace).await;
        }
        self.state = SessionState::Closed;

        tracing::info!(
            session_id = %self.id,
            peer = ?self.peer,
            duration_ms = self.created_at.elapsed().as_millis() as u64,
            frames_in = self.stats.frames_in,
            frames_out = self.stats.frames_out,
            bytes_in = self.stats.bytes_in,
            bytes_out = self.stats.bytes_out,
            dropped = self.stats.dropped,
            "Session closed"
        );
        // Dropping `self._guard` removes the registry entry.
    }

    fn describe(&self, direction: Direction, frame: &Frame) {
        metrics::record_frame(direction, frame.len());

        let bytes = match frame {
            Frame::Binary(bytes) => bytes,
            Frame::Text(text) => {
                tracing::debug!(
                    session_id = %self.id,
                    direction = direction.as_str(),
                    len = text.len(),
                    "Text frame"
                );
                return;
            }
        };

        match FrameHeader::parse(bytes) {
            Ok(header) => tracing::debug!(
                session_id = %self.id,
                direction = direction.as_str(),
                len = bytes.len(),
                message_type = header.message_type,
                kind = %header.kind(),
                flags = header.flags,
                event_id = ?header.event_id,
                "Binary frame"
            ),
            Err(e) => tracing::debug!(
                session_id = %self.id,
                direction = direction.as_str(),
                len = bytes.len(),
                error = %e,
                "Binary frame (header not decodable)"
            ),
        }
    }
}

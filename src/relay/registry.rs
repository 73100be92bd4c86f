//! Live session tracking.
//!
//! # Responsibilities
//! - Hold one entry per live session, keyed by its connect id
//! - Reserve a slot per accepted upgrade, bounded by the session limit
//! - Report the live count for status and metrics
//! - Fan a shutdown command out to every session, including ones that
//!   register after shutdown began
//! - Wait, bounded, for sessions to drain during shutdown
//!
//! Entries are removed by a guard owned by the session, so removal happens
//! exactly once no matter how many close events race.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::observability::metrics;
use crate::relay::session::SessionId;

/// Commands delivered to a running session from outside its event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Close the client leg; teardown cascades to the upstream leg.
    Shutdown,
}

/// Why a slot could not be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("session limit of {0} reached")]
    Full(usize),

    #[error("relay is shutting down")]
    Closing,
}

#[derive(Debug)]
struct SessionEntry {
    peer: Option<SocketAddr>,
    opened_at: Instant,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

/// Read-only view of a registered session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub peer: Option<SocketAddr>,
    pub age: Duration,
}

/// A session's place in the registry: the guard that removes it and the
/// receiving end of its command channel.
#[derive(Debug)]
pub struct Registration {
    pub guard: SessionGuard,
    pub peer: Option<SocketAddr>,
    pub commands: mpsc::UnboundedReceiver<SessionCommand>,
}

impl Registration {
    pub fn id(&self) -> SessionId {
        self.guard.id
    }
}

/// Registry of live sessions. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, SessionEntry>>,
    slots: Arc<AtomicUsize>,
    closing: Arc<AtomicBool>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session with no limit. The returned guard removes it when
    /// dropped. A session registered after [`close_all`](Self::close_all)
    /// finds a shutdown command already queued.
    pub fn register(&self, id: SessionId, peer: Option<SocketAddr>) -> Registration {
        self.slots.fetch_add(1, Ordering::SeqCst);
        self.insert(id, peer)
    }

    /// Reserve a slot for a new session if fewer than `limit` are live and
    /// shutdown has not begun.
    pub fn try_register(
        &self,
        id: SessionId,
        peer: Option<SocketAddr>,
        limit: usize,
    ) -> Result<Registration, RegisterError> {
        if self.is_closing() {
            return Err(RegisterError::Closing);
        }
        self.slots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |taken| {
                (taken < limit).then_some(taken + 1)
            })
            .map_err(|_| RegisterError::Full(limit))?;
        Ok(self.insert(id, peer))
    }

    fn insert(&self, id: SessionId, peer: Option<SocketAddr>) -> Registration {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.insert(
            id,
            SessionEntry {
                peer,
                opened_at: Instant::now(),
                commands: tx.clone(),
            },
        );
        metrics::record_session_opened(self.sessions.len());

        // Pairs with the store in `close_all`: either that sweep sees this
        // entry or this load sees the flag.
        if self.is_closing() {
            let _ = tx.send(SessionCommand::Shutdown);
        }

        Registration {
            guard: SessionGuard {
                id,
                sessions: Arc::clone(&self.sessions),
                slots: Arc::clone(&self.slots),
            },
            peer,
            commands: rx,
        }
    }

    /// True once [`close_all`](Self::close_all) has run.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions
            .iter()
            .map(|entry| SessionSummary {
                id: *entry.key(),
                peer: entry.peer,
                age: entry.opened_at.elapsed(),
            })
            .collect()
    }

    /// Ask every live session to shut down and refuse new ones. Returns how
    /// many were signalled.
    pub fn close_all(&self) -> usize {
        self.closing.store(true, Ordering::SeqCst);
        let mut signalled = 0;
        for entry in self.sessions.iter() {
            if entry.commands.send(SessionCommand::Shutdown).is_ok() {
                signalled += 1;
            }
        }
        tracing::info!(sessions = signalled, "Closing all sessions");
        signalled
    }

    /// Wait until no sessions remain or `timeout` elapses.
    ///
    /// Returns `true` if the registry drained.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.sessions.is_empty() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    remaining = self.sessions.len(),
                    "Sessions still open after shutdown grace period"
                );
                for session in self.summaries() {
                    tracing::warn!(
                        session_id = %session.id,
                        peer = ?session.peer,
                        age_ms = session.age.as_millis() as u64,
                        "Abandoning session"
                    );
                }
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }
}

/// Removes a session from the registry when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    id: SessionId,
    sessions: Arc<DashMap<SessionId, SessionEntry>>,
    slots: Arc<AtomicUsize>,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.slots.fetch_sub(1, Ordering::SeqCst);
        if let Some((_, entry)) = self.sessions.remove(&self.id) {
            metrics::record_session_closed(self.sessions.len(), entry.opened_at.elapsed());
            tracing::trace!(session_id = %self.id, "Session removed from registry");
        }
    }
}

//! Session relay subsystem.
//!
//! # Data Flow
//! ```text
//! Client WebSocket accepted (http/server.rs)
//!     → registry.rs (slot reserved before the upgrade completes)
//!     → session.rs (Session::create takes the reserved slot)
//!     → upstream.rs (handshake with injected credentials, bounded)
//!     → control.rs ("proxy_connected" to the client)
//!     → leg.rs (frames forwarded verbatim in both directions)
//!     → either leg ends → other leg closed → entry removed from registry
//! ```
//!
//! # Design Decisions
//! - One task per session; state is owned by that task, no locks
//! - Sends are queued to per-leg writer tasks and never block the relay loop
//! - No retries: a failed upstream ends the session, the client reconnects

pub mod control;
pub mod leg;
pub mod registry;
pub mod session;
pub mod upstream;

pub use control::ControlMessage;
pub use leg::{Direction, Frame, LegEvent, LegHandle};
pub use registry::{RegisterError, Registration, SessionCommand, SessionRegistry, SessionSummary};
pub use session::{Session, SessionId, SessionState, SessionStats};
pub use upstream::{Upstream, UpstreamError};

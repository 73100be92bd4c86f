//! Frame inspection subsystem.
//!
//! # Data Flow
//! ```text
//! Binary message from either leg
//!     → header.rs (decode type / flags / event id)
//!     → debug log line
//!     → original bytes forwarded untouched
//! ```
//!
//! # Design Decisions
//! - Pure functions, no state
//! - Decoding failures are logged and never affect forwarding

pub mod header;

pub use header::{FrameError, FrameHeader, MessageKind, EVENT_ID_FLAG, ERROR_MESSAGE_TYPE, HEADER_LEN};

//! Binary frame header decoding.
//!
//! # Layout
//! ```text
//! byte 0      reserved / protocol version (ignored)
//! byte 1      message type (high nibble) | flags (low nibble)
//! bytes 2-3   reserved (ignored)
//! [4 bytes]   error code, only when message type == 0xF (skipped)
//! [4 bytes]   event id (u32, big-endian), only when flags & 0x4
//! ```
//!
//! Decoding is diagnostic only. Callers log the result and forward the
//! original bytes whether or not the header could be described.

use thiserror::Error;

/// Length of the fixed header.
pub const HEADER_LEN: usize = 4;

/// Message type of an error frame, which carries a 4-byte error code.
pub const ERROR_MESSAGE_TYPE: u8 = 0x0F;

/// Flag bit announcing a trailing event id.
pub const EVENT_ID_FLAG: u8 = 0x04;

const ERROR_CODE_LEN: usize = 4;
const EVENT_ID_LEN: usize = 4;

/// Errors from header decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The buffer ends before a field its header claims to contain.
    #[error("truncated frame: header requires {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
}

/// Well-known message types of the realtime dialogue protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    FullClientRequest,
    AudioOnlyClientRequest,
    FullServerResponse,
    AudioOnlyServerResponse,
    Error,
    Other(u8),
}

impl From<u8> for MessageKind {
    fn from(message_type: u8) -> Self {
        match message_type {
            0x01 => Self::FullClientRequest,
            0x02 => Self::AudioOnlyClientRequest,
            0x09 => Self::FullServerResponse,
            0x0B => Self::AudioOnlyServerResponse,
            ERROR_MESSAGE_TYPE => Self::Error,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullClientRequest => f.write_str("full-client-request"),
            Self::AudioOnlyClientRequest => f.write_str("audio-only-request"),
            Self::FullServerResponse => f.write_str("full-server-response"),
            Self::AudioOnlyServerResponse => f.write_str("audio-only-response"),
            Self::Error => f.write_str("error"),
            Self::Other(t) => write!(f, "unknown-{:#x}", t),
        }
    }
}

/// Descriptor decoded from a frame header. Produced per frame for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// 4-bit message type.
    pub message_type: u8,
    /// 4-bit flags.
    pub flags: u8,
    /// Event id, present only when [`EVENT_ID_FLAG`] is set.
    pub event_id: Option<u32>,
}

impl FrameHeader {
    /// Decode the header at the start of `buf`.
    ///
    /// Bytes beyond the fields the header declares are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        let truncated = |needed: usize| FrameError::Truncated {
            needed,
            actual: buf.len(),
        };

        if buf.len() < HEADER_LEN {
            return Err(truncated(HEADER_LEN));
        }

        let message_type = buf[1] >> 4;
        let flags = buf[1] & 0x0F;
        let mut offset = HEADER_LEN;

        if message_type == ERROR_MESSAGE_TYPE {
            offset += ERROR_CODE_LEN;
            if buf.len() < offset {
                return Err(truncated(offset));
            }
        }

        let event_id = if flags & EVENT_ID_FLAG != 0 {
            let end = offset + EVENT_ID_LEN;
            let bytes: [u8; EVENT_ID_LEN] = buf
                .get(offset..end)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| truncated(end))?;
            Some(u32::from_be_bytes(bytes))
        } else {
            None
        };

        Ok(Self {
            message_type,
            flags,
            event_id,
        })
    }

    /// Minimum buffer length for the fields this header declares.
    pub fn required_len(&self) -> usize {
        let mut len = HEADER_LEN;
        if self.is_error() {
            len += ERROR_CODE_LEN;
        }
        if self.event_id.is_some() {
            len += EVENT_ID_LEN;
        }
        len
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from(self.message_type)
    }

    pub fn is_error(&self) -> bool {
        self.message_type == ERROR_MESSAGE_TYPE
    }
}

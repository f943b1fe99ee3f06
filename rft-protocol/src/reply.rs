//! Receiver-to-sender control messages
//!
//! The receiver answers with plain text: `ACK <n>` (where `n` is the next
//! sequence number it expects) or the literal `CLOSE`.

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

const ACK_PREFIX: &str = "ACK";
const CLOSE: &str = "CLOSE";

/// A control message sent from the receiver to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Cumulative acknowledgement: every sequence number below `n` was accepted
    Ack(u32),
    /// The receiver has persisted the file and is done with the session
    Close,
}

impl Reply {
    /// Serialize the reply
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_string())
    }

    /// Parse a reply from a received datagram
    ///
    /// Trailing whitespace and NUL bytes (from fixed-size receive buffers) are
    /// ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReplyError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ReplyError::NotUtf8)?;
        let text = text.trim_end_matches(|c: char| c == '\0' || c.is_ascii_whitespace());

        if text == CLOSE {
            return Ok(Reply::Close);
        }

        let mut parts = text.split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ACK_PREFIX), Some(n), None) => n
                .parse()
                .map(Reply::Ack)
                .map_err(|_| ReplyError::InvalidAck(n.to_string())),
            _ => Err(ReplyError::Unknown(text.to_string())),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ack(n) => write!(f, "{} {}", ACK_PREFIX, n),
            Reply::Close => write!(f, "{}", CLOSE),
        }
    }
}

/// Reply parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("Reply is not valid UTF-8")]
    NotUtf8,

    #[error("Invalid ACK number: {0:?}")]
    InvalidAck(String),

    #[error("Unknown reply: {0:?}")]
    Unknown(String),
}

//! RFT Protocol Core Implementation
//!
//! This crate implements the core of the RFT (Reliable File Transfer)
//! protocol: packet framing and integrity checks, receiver replies, the
//! congestion controller, and the sender and receiver session state machines.
//!
//! Nothing here touches a socket or a clock. Drivers feed the sessions with
//! datagrams and timer expiries and put whatever comes back on the wire.

pub mod congestion;
pub mod digest;
pub mod packet;
pub mod receiver;
pub mod reply;
pub mod sender;

pub use congestion::{CongestionController, CongestionStats, WindowGrowth};
pub use digest::{digests_match, file_digest};
pub use packet::{checksum, decode, encode, verify, Content, Packet, PacketError};
pub use receiver::{
    DiscardReason, Delivery, Disposition, HashCheck, ReceivedFile, ReceiverPhase, ReceiverSession,
    ReceiverStats,
};
pub use reply::{Reply, ReplyError};
pub use sender::{SenderConfig, SenderPhase, SenderSession, SenderStats, Transmit};

use thiserror::Error;

/// Session-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Packet {seq} still unacknowledged after {attempts} attempts")]
    RetriesExhausted { seq: u32, attempts: u32 },

    #[error("FIN acknowledged but no CLOSE after {attempts} attempts")]
    CloseNotReceived { attempts: u32 },

    #[error("Transfer needs {packets} packets, more than the sequence space holds")]
    SequenceSpaceExhausted { packets: u64 },

    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

//! RFT - Reliable File Transfer over UDP
//!
//! High-level API: [`FileSender`] pushes one file to a [`FileReceiver`],
//! which persists it through a [`FileSink`]. The protocol state machines live
//! in [`protocol`]; sockets and timers in [`io`].

pub use rft_io as io;
pub use rft_protocol as protocol;

pub mod error;
pub mod loss;
pub mod receiver;
pub mod sender;
pub mod sink;
pub mod stats;

pub use error::{Result, TransferError};
pub use loss::{DropOnce, LossHook, NoLoss, RandomLoss};
pub use receiver::{FileReceiver, ReceiveOptions, ReceiveReport, DEFAULT_PORT};
pub use sender::{FileSender, SendOptions, SendReport, TimerToken};
pub use sink::{DirectorySink, FileSink, MemorySink};
pub use stats::{StatsHandle, TransferStats};

// Re-export commonly used types
pub use protocol::{HashCheck, Packet, Reply, SenderConfig, WindowGrowth};

//! RFT I/O and Platform Abstraction
//!
//! This crate provides the pieces of a transfer that touch the operating
//! system: the UDP socket wrapper, the retransmission timer thread, and
//! send pacing.

pub mod socket;
pub mod time;
pub mod timer;

pub use socket::{DatagramSocket, SocketError};
pub use time::{Pacer, Timer};
pub use timer::RetransmitTimer;

//! Live transfer statistics
//!
//! The worker thread publishes a snapshot after every event it handles; other
//! threads (the CLI's progress display) read it through a [`StatsHandle`].

use parking_lot::RwLock;
use rft_protocol::{CongestionStats, ReceiverStats, SenderStats};
use std::sync::Arc;

/// Counters for one transfer, either direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Packets handed to the socket or the loss hook, retransmissions included
    pub packets_sent: u64,
    /// Timeout-driven retransmissions
    pub packets_retransmitted: u64,
    /// Sends swallowed by the loss hook
    pub packets_dropped: u64,
    /// Packets confirmed by an acknowledgement
    pub packets_acked: u64,
    /// Payload bytes sent
    pub bytes_sent: u64,
    /// Current congestion window
    pub congestion_window: u32,
    /// Current slow start threshold
    pub threshold: u32,
    /// Packets accepted by the receiver
    pub packets_accepted: u64,
    /// Packets the receiver discarded for any reason
    pub packets_discarded: u64,
    /// File bytes accepted by the receiver
    pub bytes_received: u64,
    /// Datagrams read from the socket
    pub datagrams_received: u64,
}

impl TransferStats {
    pub(crate) fn apply_sender(&mut self, session: SenderStats, congestion: CongestionStats) {
        self.packets_sent = session.packets_sent;
        self.packets_retransmitted = session.packets_retransmitted;
        self.packets_acked = session.packets_acked;
        self.bytes_sent = session.bytes_sent;
        self.congestion_window = congestion.congestion_window;
        self.threshold = congestion.threshold;
    }

    pub(crate) fn apply_receiver(&mut self, session: ReceiverStats) {
        self.packets_accepted = session.packets_accepted;
        self.packets_discarded = session.packets_malformed
            + session.packets_corrupted
            + session.packets_out_of_order
            + session.packets_duplicate;
        self.bytes_received = session.bytes_received;
    }
}

/// Shared, cheaply cloneable view of [`TransferStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<RwLock<TransferStats>>,
}

impl StatsHandle {
    /// Create a handle with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> TransferStats {
        *self.inner.read()
    }

    /// Modify the counters in place
    pub fn update<F: FnOnce(&mut TransferStats)>(&self, f: F) {
        f(&mut self.inner.write());
    }

    /// Zero every counter
    pub fn reset(&self) {
        *self.inner.write() = TransferStats::default();
    }
}

//! Receiver Session State Machine
//!
//! Accepts packets strictly in order. Anything corrupted, malformed or out of
//! order is dropped and left to the sender's retransmission timer; there is no
//! reorder buffer and no negative acknowledgement.

use crate::digest::{digests_match, file_digest};
use crate::packet::{strip_padding, Content, Packet, PacketError};
use crate::reply::Reply;
use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

/// Receiver phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverPhase {
    /// Waiting for `SYN`
    Listening,
    /// Handshake done, collecting the name, data and hash
    Collecting,
    /// `FIN` accepted and the file handed out
    Done,
}

/// Outcome of the whole-file hash comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCheck {
    /// Received content matches the sender's digest
    Passed,
    /// Received content does not match
    Failed {
        /// Digest announced by the sender
        expected: String,
        /// Digest of the content actually received
        actual: String,
    },
}

impl HashCheck {
    /// Whether the check passed
    pub fn passed(&self) -> bool {
        matches!(self, HashCheck::Passed)
    }
}

/// Why a datagram was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Could not be parsed
    Malformed(PacketError),
    /// Checksum mismatch
    Corrupted { seq: u32 },
    /// Ahead of the expected sequence number
    OutOfOrder { seq: u32, expected: u32 },
    /// Already accepted earlier
    Duplicate { seq: u32, expected: u32 },
    /// First packet of a session that is not `SYN`
    NotSyn { seq: u32 },
    /// Session already finished
    AfterDone,
    /// No sequence number left to acknowledge with
    SequenceSpaceExhausted { seq: u32 },
}

/// What happened to one datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Accepted at this sequence number
    Accepted { seq: u32 },
    /// Dropped without changing the session
    Discarded(DiscardReason),
}

/// A fully received file, ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Name announced by the sender
    pub name: String,
    /// Reconstructed content
    pub content: Bytes,
    /// Result of the hash comparison, if a hash was received
    pub hash_check: Option<HashCheck>,
}

/// Result of feeding one datagram to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Accepted or discarded
    pub disposition: Disposition,
    /// Replies to send back to the sender, in order
    pub replies: Vec<Reply>,
    /// Set once, when `FIN` is accepted
    pub completed: Option<ReceivedFile>,
}

impl Delivery {
    fn discarded(reason: DiscardReason, replies: Vec<Reply>) -> Self {
        Delivery {
            disposition: Disposition::Discarded(reason),
            replies,
            completed: None,
        }
    }

    /// Whether the datagram was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self.disposition, Disposition::Accepted { .. })
    }
}

/// Receiver statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Packets accepted in order
    pub packets_accepted: u64,
    /// Unparseable datagrams
    pub packets_malformed: u64,
    /// Checksum mismatches
    pub packets_corrupted: u64,
    /// Packets ahead of the expected sequence number
    pub packets_out_of_order: u64,
    /// Packets already accepted before
    pub packets_duplicate: u64,
    /// File content bytes accepted (padding included until stripped)
    pub bytes_received: u64,
}

/// Receiver side of one transfer
pub struct ReceiverSession {
    phase: ReceiverPhase,
    expected: u32,
    file_name: Option<String>,
    /// Content known to be final
    content: BytesMut,
    /// Most recent data chunk; its padding is only stripped once it is known
    /// to be the last one
    pending: Option<Bytes>,
    last_hash: Option<String>,
    hash_check: Option<HashCheck>,
    stats: ReceiverStats,
}

impl ReceiverSession {
    /// Create a session waiting for `SYN`
    pub fn new() -> Self {
        ReceiverSession {
            phase: ReceiverPhase::Listening,
            expected: 0,
            file_name: None,
            content: BytesMut::new(),
            pending: None,
            last_hash: None,
            hash_check: None,
            stats: ReceiverStats::default(),
        }
    }

    /// Current phase
    pub fn phase(&self) -> ReceiverPhase {
        self.phase
    }

    /// Whether `FIN` has been accepted
    pub fn is_done(&self) -> bool {
        self.phase == ReceiverPhase::Done
    }

    /// Next sequence number that will be accepted
    pub fn expected_seq(&self) -> u32 {
        self.expected
    }

    /// File name announced by the sender
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Content reconstructed so far, trailing padding stripped
    pub fn content(&self) -> Bytes {
        let mut content = self.content.clone();
        if let Some(chunk) = &self.pending {
            content.extend_from_slice(strip_padding(chunk));
        }
        content.freeze()
    }

    /// Last digest received in a `HASH:` packet
    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Outcome of the last hash comparison
    pub fn hash_check(&self) -> Option<&HashCheck> {
        self.hash_check.as_ref()
    }

    /// Statistics
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Process one inbound datagram
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Delivery {
        if self.phase == ReceiverPhase::Done {
            // Our CLOSE may have been lost; repeat it
            return Delivery::discarded(
                DiscardReason::AfterDone,
                vec![Reply::Ack(self.expected), Reply::Close],
            );
        }

        let packet = match Packet::from_bytes(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.packets_malformed += 1;
                warn!("{}. Packet discarded.", e);
                return Delivery::discarded(DiscardReason::Malformed(e), Vec::new());
            }
        };

        if !packet.is_valid() {
            self.stats.packets_corrupted += 1;
            warn!(seq = packet.seq, "CRC check failed. Packet discarded.");
            return Delivery::discarded(DiscardReason::Corrupted { seq: packet.seq }, Vec::new());
        }

        if packet.seq != self.expected {
            return self.discard_unexpected(packet.seq);
        }

        self.accept(packet)
    }

    fn discard_unexpected(&mut self, seq: u32) -> Delivery {
        let expected = self.expected;

        if seq < expected {
            // Already have it; the sender may have lost our ACK
            self.stats.packets_duplicate += 1;
            debug!(seq, expected, "Duplicate packet discarded");
            Delivery::discarded(
                DiscardReason::Duplicate { seq, expected },
                vec![Reply::Ack(expected)],
            )
        } else {
            self.stats.packets_out_of_order += 1;
            warn!(seq, expected, "Unexpected sequence number. Packet discarded.");
            Delivery::discarded(DiscardReason::OutOfOrder { seq, expected }, Vec::new())
        }
    }

    fn accept(&mut self, packet: Packet) -> Delivery {
        let seq = packet.seq;
        let content = packet.content();

        if self.phase == ReceiverPhase::Listening && content != Content::Syn {
            warn!(seq, "Expected SYN. Packet discarded.");
            return Delivery::discarded(DiscardReason::NotSyn { seq }, Vec::new());
        }

        let Some(next) = seq.checked_add(1) else {
            warn!(seq, "Sequence space exhausted. Packet discarded.");
            return Delivery::discarded(DiscardReason::SequenceSpaceExhausted { seq }, Vec::new());
        };

        debug!(seq, bytes = packet.payload.len(), "Accepted packet");
        let mut replies = vec![Reply::Ack(next)];
        let mut completed = None;

        match content {
            Content::Syn => {
                self.file_name = None;
                self.content.clear();
                self.pending = None;
                self.last_hash = None;
                self.hash_check = None;
                self.phase = ReceiverPhase::Collecting;
                info!("Handshake received");
            }
            Content::FileName(name) => {
                info!(file = %name, "Receiving file");
                self.file_name = Some(name);
            }
            Content::Hash(expected) => {
                self.flush_pending();
                let actual = file_digest(&self.content);
                let check = if digests_match(&expected, &actual) {
                    info!("MD5 hash check passed.");
                    HashCheck::Passed
                } else {
                    warn!(%expected, %actual, "MD5 hash check failed.");
                    HashCheck::Failed {
                        expected: expected.clone(),
                        actual,
                    }
                };
                self.last_hash = Some(expected);
                self.hash_check = Some(check);
            }
            Content::Fin => {
                self.flush_pending();
                let name = self.file_name.clone().unwrap_or_else(|| "unnamed".to_string());
                info!(file = %name, bytes = self.content.len(), "Connection closed by FIN.");
                completed = Some(ReceivedFile {
                    name,
                    content: self.content.clone().freeze(),
                    hash_check: self.hash_check.clone(),
                });
                replies.push(Reply::Close);
                self.phase = ReceiverPhase::Done;
            }
            Content::Data(chunk) => {
                if let Some(previous) = self.pending.take() {
                    self.content.extend_from_slice(&previous);
                }
                self.stats.bytes_received += chunk.len() as u64;
                self.pending = Some(Bytes::copy_from_slice(chunk));
            }
        }

        self.stats.packets_accepted += 1;
        self.expected = next;

        Delivery {
            disposition: Disposition::Accepted { seq },
            replies,
            completed,
        }
    }

    /// The held-back chunk is the last one: strip its padding
    fn flush_pending(&mut self) {
        if let Some(chunk) = self.pending.take() {
            self.content.extend_from_slice(strip_padding(&chunk));
        }
    }
}

impl Default for ReceiverSession {
    fn default() -> Self {
        Self::new()
    }
}

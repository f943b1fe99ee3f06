//! Sender Session State Machine
//!
//! Drives a transfer from the initiating side: `SYN`, file name, chunked data
//! under the congestion window, `HASH:<hex>`, `FIN`, then waits for `CLOSE`.
//!
//! The session performs no I/O. Callers feed it replies and timer expiries and
//! receive [`Transmit`]s back; every transmit must be written to the network
//! (or dropped by a loss simulator) and armed with a retransmission timer
//! carrying its sequence number and attempt.

use crate::congestion::{CongestionController, CongestionStats, WindowGrowth};
use crate::digest::file_digest;
use crate::packet::{Packet, DEFAULT_CHUNK_SIZE, FIN, FIRST_DATA_SEQ, NAME_SEQ, SYN, SYN_SEQ};
use crate::reply::Reply;
use crate::SessionError;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Default number of retransmissions allowed per packet
pub const DEFAULT_MAX_RETRIES: u32 = 16;

/// Sender phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderPhase {
    /// Nothing sent yet
    Init,
    /// `SYN` sent, waiting for its acknowledgement
    SynSent,
    /// File name sent, waiting for its acknowledgement
    NameSent,
    /// Data chunks in flight
    Transferring,
    /// Whole-file hash sent
    HashSent,
    /// `FIN` sent; waiting for its acknowledgement and for `CLOSE`
    FinSent,
    /// Receiver closed the session
    Closed,
}

/// Sender tuning
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Bytes of file content per data packet
    pub chunk_size: usize,
    /// Retransmissions allowed per packet (`None` retries forever)
    pub max_retries: Option<u32>,
    /// Starting congestion window
    pub initial_cwnd: u32,
    /// Starting slow start threshold
    pub initial_threshold: u32,
    /// When the congestion window grows
    pub growth: WindowGrowth,
}

impl Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            initial_cwnd: crate::congestion::INITIAL_CWND,
            initial_threshold: crate::congestion::INITIAL_THRESHOLD,
            growth: WindowGrowth::PerAck,
        }
    }
}

/// A packet that must be put on the wire and guarded by a timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    /// The framed packet
    pub packet: Packet,
    /// 1 for the first send, incremented on every retransmission
    pub attempt: u32,
}

impl Transmit {
    /// Sequence number of the packet
    #[inline]
    pub fn seq(&self) -> u32 {
        self.packet.seq
    }

    /// Whether this is a retransmission
    #[inline]
    pub fn is_retransmission(&self) -> bool {
        self.attempt > 1
    }
}

/// Sender statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Packets handed out for transmission, retransmissions included
    pub packets_sent: u64,
    /// Timeout-driven retransmissions
    pub packets_retransmitted: u64,
    /// Payload bytes handed out for transmission
    pub bytes_sent: u64,
    /// Packets confirmed by an acknowledgement
    pub packets_acked: u64,
    /// Acknowledgements that confirmed nothing new
    pub duplicate_acks: u64,
    /// Inbound datagrams that were not a valid reply
    pub replies_ignored: u64,
}

#[derive(Debug, Clone)]
struct Outstanding {
    packet: Packet,
    attempts: u32,
}

/// Sender side of one transfer
pub struct SenderSession {
    config: SenderConfig,
    phase: SenderPhase,
    file_name: String,
    content: Bytes,
    /// Sequence number the next new packet gets
    next_seq: u32,
    /// Byte offset of the next chunk to issue
    next_offset: usize,
    /// Control packet the current phase waits on
    awaiting: Option<u32>,
    /// Sent but not yet acknowledged
    outstanding: BTreeMap<u32, Outstanding>,
    /// Acknowledged FIN, repeated on timeout until `CLOSE` arrives
    close_wait: Option<Outstanding>,
    /// Every sequence number ever acknowledged
    acked: BTreeSet<u32>,
    /// Packets of the current window round (per-round growth only)
    round: Vec<u32>,
    congestion: CongestionController,
    digest: Option<String>,
    stats: SenderStats,
}

impl SenderSession {
    /// Create a session for `content`, announced to the receiver as `file_name`
    pub fn new(file_name: impl Into<String>, content: Bytes, mut config: SenderConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        let congestion =
            CongestionController::with_params(config.initial_cwnd, config.initial_threshold);

        SenderSession {
            config,
            phase: SenderPhase::Init,
            file_name: file_name.into(),
            content,
            next_seq: SYN_SEQ,
            next_offset: 0,
            awaiting: None,
            outstanding: BTreeMap::new(),
            close_wait: None,
            acked: BTreeSet::new(),
            round: Vec::new(),
            congestion,
            digest: None,
            stats: SenderStats::default(),
        }
    }

    /// Current phase
    pub fn phase(&self) -> SenderPhase {
        self.phase
    }

    /// Whether the receiver has closed the session
    pub fn is_closed(&self) -> bool {
        self.phase == SenderPhase::Closed
    }

    /// Number of sent, unacknowledged packets
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Whether `seq` has been acknowledged
    pub fn is_acknowledged(&self, seq: u32) -> bool {
        self.acked.contains(&seq)
    }

    /// Congestion controller (read-only)
    pub fn congestion(&self) -> &CongestionController {
        &self.congestion
    }

    /// Congestion statistics
    pub fn congestion_stats(&self) -> CongestionStats {
        self.congestion.stats()
    }

    /// Transfer statistics
    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Name announced to the receiver
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Digest sent in the `HASH:` packet, once computed
    pub fn file_digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Number of data chunks the content splits into
    pub fn chunk_count(&self) -> usize {
        (self.content.len() + self.config.chunk_size - 1) / self.config.chunk_size
    }

    /// Begin the handshake by sending `SYN`
    pub fn start(&mut self) -> Result<Vec<Transmit>, SessionError> {
        if self.phase != SenderPhase::Init {
            return Err(SessionError::InvalidState(format!(
                "cannot start sender in phase {:?}",
                self.phase
            )));
        }

        // SYN, name, hash and FIN around the data chunks
        check_sequence_space(self.chunk_count() as u64 + 4)?;

        info!(file = %self.file_name, bytes = self.content.len(), "Starting transfer");
        let syn = self.issue(Bytes::from_static(SYN));
        self.enter(SenderPhase::SynSent, Some(syn.seq()));
        Ok(vec![syn])
    }

    /// Process a raw inbound datagram
    ///
    /// Anything that is not a valid reply is logged and ignored.
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Vec<Transmit> {
        match Reply::from_bytes(bytes) {
            Ok(reply) => self.handle_reply(reply),
            Err(e) => {
                self.stats.replies_ignored += 1;
                debug!("Ignoring inbound message: {}", e);
                Vec::new()
            }
        }
    }

    /// Process a parsed reply and return any packets that may now be sent
    pub fn handle_reply(&mut self, reply: Reply) -> Vec<Transmit> {
        match reply {
            Reply::Ack(next_expected) => self.on_ack(next_expected),
            Reply::Close => {
                self.on_close();
                Vec::new()
            }
        }
    }

    /// Process a retransmission timer expiry for `seq`'s `attempt`
    ///
    /// Returns the packet to resend, or `None` when the timer is stale: the
    /// packet was acknowledged or already resent since the timer was armed.
    /// An acknowledged FIN stays under its timer until `CLOSE` arrives.
    pub fn handle_timeout(
        &mut self,
        seq: u32,
        attempt: u32,
    ) -> Result<Option<Transmit>, SessionError> {
        if self.phase == SenderPhase::Closed {
            return Ok(None);
        }
        if self.close_wait.as_ref().map_or(false, |fin| fin.packet.seq == seq) {
            return self.repeat_fin(attempt);
        }
        if self.acked.contains(&seq) {
            return Ok(None);
        }
        let Some(entry) = self.outstanding.get_mut(&seq) else {
            return Ok(None);
        };
        if entry.attempts != attempt {
            return Ok(None);
        }

        if let Some(max_retries) = self.config.max_retries {
            if entry.attempts > max_retries {
                return Err(SessionError::RetriesExhausted {
                    seq,
                    attempts: entry.attempts,
                });
            }
        }

        self.congestion.on_timeout();

        entry.attempts += 1;
        let transmit = Transmit {
            packet: entry.packet.clone(),
            attempt: entry.attempts,
        };

        warn!(
            seq,
            attempt = transmit.attempt,
            cwnd = self.congestion.congestion_window(),
            threshold = self.congestion.threshold(),
            "Timeout, resending"
        );

        self.stats.packets_retransmitted += 1;
        self.count_sent(&transmit);
        Ok(Some(transmit))
    }

    /// `CLOSE` was lost: resend FIN so the finished receiver repeats it
    fn repeat_fin(&mut self, attempt: u32) -> Result<Option<Transmit>, SessionError> {
        let max_retries = self.config.max_retries;
        let Some(fin) = self.close_wait.as_mut() else {
            return Ok(None);
        };
        if fin.attempts != attempt {
            return Ok(None);
        }
        if let Some(max_retries) = max_retries {
            if fin.attempts > max_retries {
                return Err(SessionError::CloseNotReceived {
                    attempts: fin.attempts,
                });
            }
        }

        fin.attempts += 1;
        let transmit = Transmit {
            packet: fin.packet.clone(),
            attempt: fin.attempts,
        };
        warn!(seq = transmit.seq(), attempt = transmit.attempt, "No CLOSE yet, repeating FIN");

        self.stats.packets_retransmitted += 1;
        self.count_sent(&transmit);
        Ok(Some(transmit))
    }

    fn on_ack(&mut self, next_expected: u32) -> Vec<Transmit> {
        // ACK n confirms every sequence number below n
        let newly_acked: Vec<u32> = self
            .outstanding
            .range(..next_expected)
            .map(|(&seq, _)| seq)
            .collect();

        if newly_acked.is_empty() {
            self.stats.duplicate_acks += 1;
            debug!(ack = next_expected, "Duplicate ACK");
            return Vec::new();
        }

        for seq in newly_acked {
            if let Some(entry) = self.outstanding.remove(&seq) {
                if self.phase == SenderPhase::FinSent && self.awaiting == Some(seq) {
                    self.close_wait = Some(entry);
                }
            }
            self.acked.insert(seq);
            self.stats.packets_acked += 1;
            debug!(seq, "Received ACK");

            if self.config.growth == WindowGrowth::PerAck {
                self.congestion.on_ack_signal();
            }
        }

        if !self.round.is_empty() && self.round.iter().all(|seq| self.acked.contains(seq)) {
            debug!(packets = self.round.len(), "Window round complete");
            self.round.clear();
            if self.config.growth == WindowGrowth::PerRound {
                self.congestion.on_ack_signal();
            }
        }

        self.advance()
    }

    fn on_close(&mut self) {
        match self.phase {
            SenderPhase::FinSent => {
                // The receiver only closes after accepting FIN
                for seq in std::mem::take(&mut self.outstanding).into_keys() {
                    self.acked.insert(seq);
                }
                self.close_wait = None;
                info!("Received CLOSE from receiver");
                self.enter(SenderPhase::Closed, None);
            }
            SenderPhase::Closed => {}
            phase => {
                self.stats.replies_ignored += 1;
                warn!(?phase, "Ignoring CLOSE before FIN");
            }
        }
    }

    /// Move through as many phases as the acknowledged set allows
    fn advance(&mut self) -> Vec<Transmit> {
        let mut out = Vec::new();

        loop {
            let awaited_acked = self.awaiting.map_or(true, |seq| self.acked.contains(&seq));

            match self.phase {
                SenderPhase::SynSent if awaited_acked => {
                    let name = Bytes::from(self.file_name.clone().into_bytes());
                    let transmit = self.issue(name);
                    debug_assert_eq!(transmit.seq(), NAME_SEQ);
                    self.enter(SenderPhase::NameSent, Some(transmit.seq()));
                    out.push(transmit);
                }
                SenderPhase::NameSent if awaited_acked => {
                    self.enter(SenderPhase::Transferring, None);
                }
                SenderPhase::Transferring => {
                    self.fill_window(&mut out);

                    if !self.data_complete() {
                        break;
                    }
                    let digest = file_digest(&self.content);
                    let packet = Packet::hash(self.next_seq, &digest);
                    self.digest = Some(digest);
                    let transmit = self.issue_packet(packet);
                    self.enter(SenderPhase::HashSent, Some(transmit.seq()));
                    out.push(transmit);
                }
                SenderPhase::HashSent if awaited_acked => {
                    let transmit = self.issue(Bytes::from_static(FIN));
                    self.enter(SenderPhase::FinSent, Some(transmit.seq()));
                    out.push(transmit);
                }
                SenderPhase::FinSent if awaited_acked => {
                    info!("FIN acknowledged, waiting for CLOSE");
                    self.awaiting = None;
                    break;
                }
                _ => break,
            }
        }

        out
    }

    /// Issue new data chunks while the window has room
    ///
    /// With per-round growth a new round only starts once every packet of the
    /// previous one is acknowledged.
    fn fill_window(&mut self, out: &mut Vec<Transmit>) {
        if self.config.growth == WindowGrowth::PerRound && !self.round.is_empty() {
            return;
        }
        let window = self.congestion.congestion_window() as usize;

        while self.outstanding.len() < window && self.next_offset < self.content.len() {
            let end = (self.next_offset + self.config.chunk_size).min(self.content.len());
            let packet = Packet::data(
                self.next_seq,
                &self.content[self.next_offset..end],
                self.config.chunk_size,
            );
            self.next_offset = end;
            out.push(self.issue_packet(packet));
        }
    }

    /// Every chunk issued and acknowledged
    ///
    /// Entries only leave the outstanding table when their sequence number
    /// enters the acknowledged set, so an empty data range means every chunk
    /// is confirmed.
    fn data_complete(&self) -> bool {
        self.next_offset >= self.content.len()
            && self.outstanding.range(FIRST_DATA_SEQ..).next().is_none()
    }

    fn issue(&mut self, payload: Bytes) -> Transmit {
        let packet = Packet::control(self.next_seq, payload);
        self.issue_packet(packet)
    }

    fn issue_packet(&mut self, packet: Packet) -> Transmit {
        let seq = packet.seq;
        debug_assert_eq!(seq, self.next_seq);
        // Cannot overflow: start() checked the packet count
        self.next_seq += 1;

        self.outstanding.insert(
            seq,
            Outstanding {
                packet: packet.clone(),
                attempts: 1,
            },
        );
        if self.config.growth == WindowGrowth::PerRound {
            self.round.push(seq);
        }

        let transmit = Transmit { packet, attempt: 1 };
        debug!(seq, bytes = transmit.packet.payload.len(), "Sending packet");
        self.count_sent(&transmit);
        transmit
    }

    fn count_sent(&mut self, transmit: &Transmit) {
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += transmit.packet.payload.len() as u64;
    }

    fn enter(&mut self, phase: SenderPhase, awaiting: Option<u32>) {
        info!(from = ?self.phase, to = ?phase, "Sender phase change");
        self.phase = phase;
        self.awaiting = awaiting;
    }
}

/// Every packet of a transfer needs its own sequence number
fn check_sequence_space(packets: u64) -> Result<(), SessionError> {
    // next_seq is bumped once past the last packet, so u32::MAX itself is unused
    if packets > u64::from(u32::MAX) {
        return Err(SessionError::SequenceSpaceExhausted { packets });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack_all(session: &mut SenderSession, sent: &[Transmit]) -> Vec<Transmit> {
        let mut out = Vec::new();
        for t in sent {
            out.extend(session.handle_reply(Reply::Ack(t.seq() + 1)));
        }
        out
    }

    #[test]
    fn test_handshake_sequence() {
        let mut session = SenderSession::new("report.txt", Bytes::new(), SenderConfig::default());

        let syn = session.start().unwrap();
        assert_eq!(syn.len(), 1);
        assert_eq!(syn[0].seq(), 0);
        assert_eq!(&syn[0].packet.payload[..], b"SYN");
        assert_eq!(session.phase(), SenderPhase::SynSent);

        let name = session.handle_reply(Reply::Ack(1));
        assert_eq!(name.len(), 1);
        assert_eq!(name[0].seq(), 1);
        assert_eq!(&name[0].packet.payload[..], b"report.txt");
        assert_eq!(session.phase(), SenderPhase::NameSent);
        assert!(session.is_acknowledged(0));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut session = SenderSession::new("a", Bytes::new(), SenderConfig::default());
        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[test]
    fn test_empty_file_goes_straight_to_hash() {
        let mut session = SenderSession::new("empty", Bytes::new(), SenderConfig::default());
        session.start().unwrap();
        session.handle_reply(Reply::Ack(1));

        let hash = session.handle_reply(Reply::Ack(2));
        assert_eq!(hash.len(), 1);
        assert_eq!(hash[0].seq(), 2);
        assert!(hash[0].packet.payload.starts_with(b"HASH:"));
        assert_eq!(session.phase(), SenderPhase::HashSent);
    }

    #[test]
    fn test_window_limits_outstanding() {
        let content = Bytes::from(vec![b'x'; 100]);
        let config = SenderConfig {
            initial_cwnd: 1,
            initial_threshold: 64,
            ..SenderConfig::default()
        };
        let mut session = SenderSession::new("f", content, config);
        session.start().unwrap();
        session.handle_reply(Reply::Ack(1));

        // SYN and name ACKs doubled the window twice
        let data = session.handle_reply(Reply::Ack(2));
        assert_eq!(session.congestion().congestion_window(), 4);
        assert_eq!(data.len(), 4);
        assert_eq!(session.outstanding_count(), 4);
        assert_eq!(
            data.iter().map(Transmit::seq).collect::<Vec<_>>(),
            vec![2, 3, 4, 5]
        );
    }

    #[test]
    fn test_full_transfer_and_close() {
        let content = Bytes::from_static(b"HELLO WORLD");
        let mut session = SenderSession::new("report.txt", content, SenderConfig::default());

        let mut pending = session.start().unwrap();
        let mut sent = Vec::new();
        while !pending.is_empty() {
            sent.extend(pending.iter().cloned());
            pending = ack_all(&mut session, &pending);
        }

        let payloads: Vec<_> = sent.iter().map(|t| t.packet.payload.clone()).collect();
        assert_eq!(&payloads[2][..], b"HELLO WORL");
        assert_eq!(&payloads[3][..], b"D         ");
        assert_eq!(
            &payloads[4][..],
            b"HASH:361fadf1c712e812d198c4cab5712a79".as_slice()
        );
        assert_eq!(&payloads[5][..], b"FIN");
        assert_eq!(session.phase(), SenderPhase::FinSent);

        session.handle_reply(Reply::Close);
        assert!(session.is_closed());
    }

    #[test]
    fn test_cumulative_ack() {
        let content = Bytes::from(vec![b'x'; 50]);
        let mut session = SenderSession::new("f", content, SenderConfig::default());
        session.start().unwrap();
        session.handle_reply(Reply::Ack(1));
        let data = session.handle_reply(Reply::Ack(2));
        assert_eq!(data.len(), 4);

        // Acknowledges seqs 2..=4 in one go
        session.handle_reply(Reply::Ack(5));
        assert!(session.is_acknowledged(2));
        assert!(session.is_acknowledged(3));
        assert!(session.is_acknowledged(4));
        assert!(!session.is_acknowledged(5));
    }

    #[test]
    fn test_duplicate_ack_is_ignored() {
        let mut session = SenderSession::new("f", Bytes::new(), SenderConfig::default());
        session.start().unwrap();
        session.handle_reply(Reply::Ack(1));

        assert!(session.handle_reply(Reply::Ack(1)).is_empty());
        assert_eq!(session.stats().duplicate_acks, 1);
        assert_eq!(session.phase(), SenderPhase::NameSent);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let mut session = SenderSession::new("f", Bytes::new(), SenderConfig::default());
        session.start().unwrap();

        assert!(session.handle_datagram(b"hello").is_empty());
        assert!(session.handle_datagram(b"ACK x").is_empty());
        assert_eq!(session.stats().replies_ignored, 2);
        assert_eq!(session.phase(), SenderPhase::SynSent);
    }

    #[test]
    fn test_timeout_resends_and_penalizes() {
        let mut session = SenderSession::new("f", Bytes::new(), SenderConfig::default());
        let syn = session.start().unwrap();

        let resend = session.handle_timeout(0, syn[0].attempt).unwrap().unwrap();
        assert_eq!(resend.packet, syn[0].packet);
        assert_eq!(resend.attempt, 2);
        assert!(resend.is_retransmission());
        assert_eq!(session.congestion().congestion_window(), 1);
        assert_eq!(session.congestion().threshold(), 32);

        // The timer armed for the first attempt is now stale
        assert_eq!(session.handle_timeout(0, 1).unwrap(), None);
    }

    #[test]
    fn test_timeout_after_ack_is_noop() {
        let mut session = SenderSession::new("f", Bytes::new(), SenderConfig::default());
        session.start().unwrap();
        session.handle_reply(Reply::Ack(1));

        assert_eq!(session.handle_timeout(0, 1).unwrap(), None);
        assert_eq!(session.congestion().stats().timeouts, 0);
    }

    #[test]
    fn test_retries_exhausted() {
        let config = SenderConfig {
            max_retries: Some(2),
            ..SenderConfig::default()
        };
        let mut session = SenderSession::new("f", Bytes::new(), config);
        session.start().unwrap();

        assert!(session.handle_timeout(0, 1).unwrap().is_some());
        assert!(session.handle_timeout(0, 2).unwrap().is_some());
        assert_eq!(
            session.handle_timeout(0, 3),
            Err(SessionError::RetriesExhausted {
                seq: 0,
                attempts: 3
            })
        );
    }

    #[test]
    fn test_per_round_growth() {
        let content = Bytes::from(vec![b'x'; 100]);
        let config = SenderConfig {
            growth: WindowGrowth::PerRound,
            ..SenderConfig::default()
        };
        let mut session = SenderSession::new("f", content, config);
        session.start().unwrap();
        session.handle_reply(Reply::Ack(1));
        let data = session.handle_reply(Reply::Ack(2));

        // SYN round and name round
        assert_eq!(session.congestion().congestion_window(), 4);
        assert_eq!(data.len(), 4);

        session.handle_reply(Reply::Ack(3));
        session.handle_reply(Reply::Ack(4));
        assert_eq!(session.congestion().congestion_window(), 4);

        session.handle_reply(Reply::Ack(6));
        assert_eq!(session.congestion().congestion_window(), 8);
    }

    /// Drive a lossless transfer up to the point where FIN is acknowledged
    fn ack_through_fin(session: &mut SenderSession) -> Transmit {
        let mut pending = session.start().unwrap();
        let mut last = None;
        while !pending.is_empty() {
            last = pending.last().cloned();
            pending = ack_all(session, &pending);
        }
        last.unwrap()
    }

    #[test]
    fn test_acknowledged_fin_repeats_until_close() {
        let mut session = SenderSession::new("f", Bytes::from_static(b"x"), SenderConfig::default());
        let fin = ack_through_fin(&mut session);
        assert_eq!(&fin.packet.payload[..], b"FIN");
        assert_eq!(session.phase(), SenderPhase::FinSent);
        assert_eq!(session.outstanding_count(), 0);

        // CLOSE was lost; the FIN timer must still produce a resend
        let again = session.handle_timeout(fin.seq(), fin.attempt).unwrap().unwrap();
        assert_eq!(again.packet, fin.packet);
        assert_eq!(again.attempt, fin.attempt + 1);
        assert_eq!(session.congestion_stats().timeouts, 0);

        // The stale token for the first attempt does nothing
        assert_eq!(session.handle_timeout(fin.seq(), fin.attempt).unwrap(), None);

        // The finished receiver answers with a duplicate ACK and CLOSE
        assert!(session.handle_reply(Reply::Ack(fin.seq() + 1)).is_empty());
        session.handle_reply(Reply::Close);
        assert!(session.is_closed());
        assert_eq!(session.handle_timeout(fin.seq(), again.attempt).unwrap(), None);
    }

    #[test]
    fn test_close_wait_is_bounded() {
        let config = SenderConfig {
            max_retries: Some(1),
            ..SenderConfig::default()
        };
        let mut session = SenderSession::new("f", Bytes::new(), config);
        let fin = ack_through_fin(&mut session);

        let again = session.handle_timeout(fin.seq(), 1).unwrap().unwrap();
        assert_eq!(
            session.handle_timeout(fin.seq(), again.attempt),
            Err(SessionError::CloseNotReceived { attempts: 2 })
        );
    }

    #[test]
    fn test_sequence_space_limit() {
        assert!(check_sequence_space(6).is_ok());
        assert!(check_sequence_space(u64::from(u32::MAX)).is_ok());
        assert_eq!(
            check_sequence_space(u64::from(u32::MAX) + 1),
            Err(SessionError::SequenceSpaceExhausted {
                packets: u64::from(u32::MAX) + 1
            })
        );
    }

    #[test]
    fn test_close_before_fin_is_ignored() {
        let mut session = SenderSession::new("f", Bytes::new(), SenderConfig::default());
        session.start().unwrap();
        session.handle_reply(Reply::Close);
        assert_eq!(session.phase(), SenderPhase::SynSent);
    }
}

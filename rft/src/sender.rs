//! Sending driver
//!
//! Runs a [`SenderSession`] against a real UDP socket. Three threads are
//! involved:
//!
//! - the caller's thread is the worker: it owns the session and is the only
//!   one that reads or changes it;
//! - a reader thread posts every inbound datagram onto the event queue;
//! - the [`RetransmitTimer`] thread posts expired [`TimerToken`]s onto the
//!   same queue.
//!
//! The worker drains the queue until the receiver sends `CLOSE` or the
//! session fails, then tears everything down exactly once.

use crate::error::{Result, TransferError};
use crate::loss::{LossHook, NoLoss};
use crate::stats::StatsHandle;
use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};
use rft_io::{DatagramSocket, Pacer, RetransmitTimer, SocketError};
use rft_protocol::packet::MAX_DATAGRAM_SIZE;
use rft_protocol::{CongestionStats, SenderConfig, SenderSession, SenderStats, Transmit};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Default retransmission timeout
pub const DEFAULT_RETRANSMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default socket read timeout for the reader thread
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sending driver options
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Session tuning (chunk size, retries, congestion parameters)
    pub session: SenderConfig,
    /// How long a packet may stay unacknowledged before it is resent
    pub retransmit_timeout: Duration,
    /// Minimum delay between consecutive sends
    pub pacing: Duration,
    /// How often the reader thread checks for shutdown
    pub poll_interval: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        SendOptions {
            session: SenderConfig::default(),
            retransmit_timeout: DEFAULT_RETRANSMIT_TIMEOUT,
            pacing: Duration::ZERO,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Identifies one armed retransmission deadline
///
/// A token is stale once its packet is acknowledged or resent with a higher
/// attempt; the session ignores stale tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub seq: u32,
    pub attempt: u32,
}

/// Worker input
#[derive(Debug)]
enum Event {
    Datagram { bytes: Bytes, from: SocketAddr },
    Timeout(TimerToken),
}

impl From<TimerToken> for Event {
    fn from(token: TimerToken) -> Self {
        Event::Timeout(token)
    }
}

/// Summary of a finished transfer
#[derive(Debug, Clone)]
pub struct SendReport {
    /// Name announced to the receiver
    pub file_name: String,
    /// File size
    pub bytes: usize,
    /// Data packets the file was split into
    pub chunks: usize,
    /// Hex MD5 digest sent in the `HASH:` packet
    pub digest: String,
    /// Session counters
    pub stats: SenderStats,
    /// Congestion state at the end of the transfer
    pub congestion: CongestionStats,
    /// Sends swallowed by the loss hook
    pub dropped: u64,
    /// Wall time from `SYN` to `CLOSE`
    pub elapsed: Duration,
}

/// Sends one file to a receiver
pub struct FileSender {
    socket: Arc<DatagramSocket>,
    peer: SocketAddr,
    options: SendOptions,
    loss: Box<dyn LossHook>,
    stats: StatsHandle,
}

impl FileSender {
    /// Bind an ephemeral local port and prepare to send to `peer`
    pub fn new(peer: SocketAddr, options: SendOptions) -> Result<Self> {
        let socket = DatagramSocket::bind_for(peer)?;
        Ok(Self::with_socket(socket, peer, options))
    }

    /// Use an already bound socket
    pub fn with_socket(socket: DatagramSocket, peer: SocketAddr, options: SendOptions) -> Self {
        FileSender {
            socket: Arc::new(socket),
            peer,
            options,
            loss: Box::new(NoLoss),
            stats: StatsHandle::new(),
        }
    }

    /// Consult `loss` before every send
    pub fn with_loss(mut self, loss: impl LossHook + 'static) -> Self {
        self.loss = Box::new(loss);
        self
    }

    /// Local address of the socket
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Receiver address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Live statistics, readable from other threads during [`send`](Self::send)
    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// Transfer `content` as `file_name` and wait for the receiver to close
    ///
    /// Consumes the sender: the socket is closed when this returns, whether
    /// the transfer succeeded or not.
    pub fn send(mut self, file_name: &str, content: Bytes) -> Result<SendReport> {
        let started = Instant::now();
        let bytes = content.len();
        let mut session = SenderSession::new(file_name, content, self.options.session.clone());

        self.socket
            .set_read_timeout(Some(self.options.poll_interval))?;

        let (events_tx, events_rx) = channel::unbounded::<Event>();
        let timer =
            RetransmitTimer::<TimerToken>::spawn(events_tx.clone()).map_err(TransferError::Spawn)?;
        let running = Arc::new(AtomicBool::new(true));
        let reader = spawn_reader(self.socket.clone(), events_tx, running.clone())?;

        info!(peer = %self.peer, file = %file_name, bytes, "Sending file");
        let result = self.run(&mut session, &events_rx, &timer);

        // Teardown, once, on every exit path
        running.store(false, Ordering::SeqCst);
        drop(timer);
        self.socket.close();
        if reader.join().is_err() {
            error!("Reader thread panicked");
        }
        self.publish(&session);

        match result {
            Ok(()) => {
                let elapsed = started.elapsed();
                let dropped = self.stats.snapshot().packets_dropped;
                info!(
                    file = %file_name,
                    bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    retransmitted = session.stats().packets_retransmitted,
                    "Transfer complete"
                );
                Ok(SendReport {
                    file_name: file_name.to_string(),
                    bytes,
                    chunks: session.chunk_count(),
                    digest: session.file_digest().unwrap_or_default().to_string(),
                    stats: session.stats(),
                    congestion: session.congestion_stats(),
                    dropped,
                    elapsed,
                })
            }
            Err(e) => {
                error!(file = %file_name, "Transfer failed: {}", e);
                Err(e)
            }
        }
    }

    fn run(
        &mut self,
        session: &mut SenderSession,
        events: &Receiver<Event>,
        timer: &RetransmitTimer<TimerToken>,
    ) -> Result<()> {
        let mut pacer = Pacer::new(self.options.pacing);

        for transmit in session.start()? {
            self.transmit(transmit, timer, &mut pacer)?;
        }
        self.publish(session);

        while !session.is_closed() {
            let event = events.recv().map_err(|_| TransferError::Disconnected)?;

            let transmits = match event {
                Event::Datagram { bytes, from } => {
                    if from != self.peer {
                        debug!(%from, "Ignoring datagram from unknown peer");
                        continue;
                    }
                    session.handle_datagram(&bytes)
                }
                Event::Timeout(token) => session
                    .handle_timeout(token.seq, token.attempt)?
                    .into_iter()
                    .collect(),
            };

            for transmit in transmits {
                self.transmit(transmit, timer, &mut pacer)?;
            }
            self.publish(session);
        }

        Ok(())
    }

    /// Put one packet on the wire (unless the loss hook eats it) and arm its timer
    fn transmit(
        &mut self,
        transmit: Transmit,
        timer: &RetransmitTimer<TimerToken>,
        pacer: &mut Pacer,
    ) -> Result<()> {
        let token = TimerToken {
            seq: transmit.seq(),
            attempt: transmit.attempt,
        };

        pacer.wait();

        if self.loss.should_drop(token.seq, token.attempt) {
            debug!(seq = token.seq, attempt = token.attempt, "Simulated packet loss");
            self.stats.update(|s| s.packets_dropped += 1);
        } else {
            match self.socket.send_to(&transmit.packet.to_bytes(), self.peer) {
                Ok(_) => trace!(seq = token.seq, attempt = token.attempt, "Sent packet"),
                Err(SocketError::Closed) => warn!(seq = token.seq, "Send after close ignored"),
                Err(e) => warn!(seq = token.seq, "Send failed: {}", e),
            }
        }

        if !timer.arm_after(token, self.options.retransmit_timeout) {
            return Err(TransferError::Disconnected);
        }
        Ok(())
    }

    fn publish(&self, session: &SenderSession) {
        let stats = session.stats();
        let congestion = session.congestion_stats();
        self.stats.update(|s| s.apply_sender(stats, congestion));
    }
}

fn spawn_reader(
    socket: Arc<DatagramSocket>,
    events: Sender<Event>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("rft-reader".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            while running.load(Ordering::SeqCst) {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => {
                        let event = Event::Datagram {
                            bytes: Bytes::copy_from_slice(&buf[..len]),
                            from,
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.is_timeout() => {}
                    Err(SocketError::Closed) => break,
                    Err(e) => debug!("Receive failed: {}", e),
                }
            }
            trace!("Reader thread stopped");
        })
        .map_err(TransferError::Spawn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SendOptions::default();
        assert_eq!(options.retransmit_timeout, Duration::from_secs(10));
        assert_eq!(options.pacing, Duration::ZERO);
        assert_eq!(options.session.chunk_size, 10);
    }

    #[test]
    fn test_timer_token_becomes_event() {
        let token = TimerToken { seq: 5, attempt: 2 };
        assert!(matches!(Event::from(token), Event::Timeout(t) if t == token));
    }

    #[test]
    fn test_unanswered_transfer_exhausts_retries() {
        // Nothing listens on the peer socket, so SYN is never acknowledged
        let silent = DatagramSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let options = SendOptions {
            session: SenderConfig {
                max_retries: Some(2),
                ..SenderConfig::default()
            },
            retransmit_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(10),
            ..SendOptions::default()
        };

        let sender = FileSender::new(silent.local_addr(), options).unwrap();
        let stats = sender.stats_handle();
        let err = sender
            .send("report.txt", Bytes::from_static(b"HELLO WORLD"))
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::Session(rft_protocol::SessionError::RetriesExhausted { seq: 0, .. })
        ));
        assert_eq!(stats.snapshot().packets_retransmitted, 2);
    }
}

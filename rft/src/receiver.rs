//! Receiving driver
//!
//! Feeds datagrams from a bound UDP socket into a [`ReceiverSession`] and
//! answers with its replies. The receiver never retransmits on its own, so
//! the socket read loop is the session's only event source and runs on the
//! caller's thread.
//!
//! A completed file is persisted before `CLOSE` goes out. After that the
//! driver lingers for a while, repeating `ACK`/`CLOSE` to a sender whose
//! copy of the reply was lost.

use crate::error::{Result, TransferError};
use crate::sink::FileSink;
use crate::stats::StatsHandle;
use rft_io::{DatagramSocket, SocketError, Timer};
use rft_protocol::packet::MAX_DATAGRAM_SIZE;
use rft_protocol::{HashCheck, ReceiverPhase, ReceiverSession, ReceiverStats, Reply};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default well-known receiver port
pub const DEFAULT_PORT: u16 = 9876;

/// Receiving driver options
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// Socket read timeout; bounds how late idle and linger deadlines are noticed
    pub poll_interval: Duration,
    /// Give up if nothing arrives for this long (`None` waits forever)
    pub idle_timeout: Option<Duration>,
    /// How long to keep answering after the file is complete
    pub linger: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        ReceiveOptions {
            poll_interval: Duration::from_millis(100),
            idle_timeout: None,
            linger: Duration::from_secs(1),
        }
    }
}

/// Summary of a received file
#[derive(Debug, Clone)]
pub struct ReceiveReport {
    /// Name announced by the sender
    pub file_name: String,
    /// Where the sink stored it
    pub stored_at: String,
    /// File size
    pub bytes: usize,
    /// Whole-file hash comparison, if the sender sent a hash
    pub hash_check: Option<HashCheck>,
    /// Sender address
    pub peer: SocketAddr,
    /// Session counters
    pub stats: ReceiverStats,
    /// Wall time from the first datagram to `FIN`
    pub elapsed: Duration,
}

struct Completed {
    file_name: String,
    stored_at: String,
    bytes: usize,
    hash_check: Option<HashCheck>,
    peer: SocketAddr,
    elapsed: Duration,
    linger: Timer,
}

/// Receives files on a bound socket, one session at a time
pub struct FileReceiver {
    socket: DatagramSocket,
    options: ReceiveOptions,
    stats: StatsHandle,
}

impl FileReceiver {
    /// Bind the receiving socket
    pub fn bind(addr: SocketAddr, options: ReceiveOptions) -> Result<Self> {
        let socket = DatagramSocket::bind(addr)?;
        socket.set_read_timeout(Some(options.poll_interval))?;
        info!(local_addr = %socket.local_addr(), "Receiver listening");
        Ok(FileReceiver {
            socket,
            options,
            stats: StatsHandle::new(),
        })
    }

    /// Local address of the socket
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Live statistics of the current session
    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// Close the socket; any later [`receive`](Self::receive) fails
    pub fn close(&self) {
        self.socket.close();
    }

    /// Run one session to completion and persist the file into `sink`
    ///
    /// Can be called again for the next file.
    pub fn receive(&mut self, sink: &mut dyn FileSink) -> Result<ReceiveReport> {
        let mut session = ReceiverSession::new();
        let mut peer: Option<SocketAddr> = None;
        let mut idle = Timer::new(self.options.idle_timeout.unwrap_or(Duration::MAX));
        let mut started: Option<Instant> = None;
        let mut completed: Option<Completed> = None;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        self.stats.reset();

        loop {
            if let Some(done) = &completed {
                if done.linger.expired() {
                    break;
                }
            }

            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.is_timeout() => {
                    if completed.is_none() && idle.expired() {
                        let waited = self.options.idle_timeout.unwrap_or(Duration::MAX);
                        warn!(?waited, "No datagram from sender, giving up");
                        return Err(TransferError::Idle(waited));
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            idle.reset();
            self.stats.update(|s| s.datagrams_received += 1);

            if let Some(locked) = peer {
                if from != locked {
                    debug!(%from, peer = %locked, "Ignoring datagram from another sender");
                    continue;
                }
            }

            let delivery = session.handle_datagram(&buf[..len]);

            if peer.is_none() && session.phase() != ReceiverPhase::Listening {
                info!(peer = %from, "Session started");
                peer = Some(from);
                started = Some(Instant::now());
            }

            if let Some(file) = delivery.completed {
                let stored_at = sink
                    .persist(&file.name, &file.content)
                    .map_err(TransferError::Sink)?;
                info!(file = %file.name, bytes = file.content.len(), %stored_at, "File saved");
                completed = Some(Completed {
                    file_name: file.name,
                    stored_at,
                    bytes: file.content.len(),
                    hash_check: file.hash_check,
                    peer: from,
                    elapsed: started.map(|t| t.elapsed()).unwrap_or_default(),
                    linger: Timer::new(self.options.linger),
                });
            }

            for reply in &delivery.replies {
                self.reply(reply, from);
            }

            let session_stats = session.stats();
            self.stats.update(|s| s.apply_receiver(session_stats));
        }

        match completed {
            Some(done) => Ok(ReceiveReport {
                file_name: done.file_name,
                stored_at: done.stored_at,
                bytes: done.bytes,
                hash_check: done.hash_check,
                peer: done.peer,
                stats: session.stats(),
                elapsed: done.elapsed,
            }),
            None => Err(TransferError::Disconnected),
        }
    }

    fn reply(&self, reply: &Reply, to: SocketAddr) {
        match self.socket.send_to(&reply.to_bytes(), to) {
            Ok(_) => debug!(%reply, %to, "Sent reply"),
            Err(SocketError::Closed) => warn!(%reply, "Reply after close ignored"),
            Err(e) => warn!(%reply, "Failed to send reply: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use rft_protocol::Packet;

    fn options() -> ReceiveOptions {
        ReceiveOptions {
            poll_interval: Duration::from_millis(10),
            idle_timeout: Some(Duration::from_millis(200)),
            linger: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_idle_timeout() {
        let mut receiver = FileReceiver::bind("127.0.0.1:0".parse().unwrap(), options()).unwrap();
        let mut sink = MemorySink::new();

        let err = receiver.receive(&mut sink).unwrap_err();
        assert!(matches!(err, TransferError::Idle(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_receive_after_close_fails() {
        let mut receiver = FileReceiver::bind("127.0.0.1:0".parse().unwrap(), options()).unwrap();
        receiver.close();

        let err = receiver.receive(&mut MemorySink::new()).unwrap_err();
        assert!(matches!(err, TransferError::Socket(SocketError::Closed)));
    }

    #[test]
    fn test_scripted_sender() {
        let mut receiver = FileReceiver::bind("127.0.0.1:0".parse().unwrap(), options()).unwrap();
        let target = receiver.local_addr();
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        let handle = std::thread::spawn(move || receiver.receive(&mut writer));

        let client = DatagramSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let digest = rft_protocol::file_digest(b"HELLO WORLD");
        let packets = [
            Packet::control(0, "SYN"),
            Packet::control(1, "report.txt"),
            Packet::data(2, b"HELLO WORL", 10),
            Packet::data(3, b"D", 10),
            Packet::hash(4, &digest),
            Packet::control(5, "FIN"),
        ];

        let mut buf = [0u8; 64];
        for packet in &packets {
            client.send_to(&packet.to_bytes(), target).unwrap();
            let (len, _) = client.recv_from(&mut buf).unwrap();
            assert_eq!(
                Reply::from_bytes(&buf[..len]).unwrap(),
                Reply::Ack(packet.seq + 1)
            );
        }
        let (len, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(Reply::from_bytes(&buf[..len]).unwrap(), Reply::Close);

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.file_name, "report.txt");
        assert_eq!(report.bytes, 11);
        assert_eq!(report.hash_check, Some(HashCheck::Passed));
        assert_eq!(report.peer, client.local_addr());
        assert_eq!(sink.get("report.txt").unwrap().as_ref(), b"HELLO WORLD");
    }
}

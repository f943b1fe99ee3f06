//! UDP socket wrapper for RFT
//!
//! A blocking UDP socket with a read timeout, shareable between a reader
//! thread and the session worker. Closing releases the descriptor exactly
//! once; any send or receive afterwards fails with [`SocketError::Closed`]
//! instead of panicking.

use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,

    #[error("Socket is closed")]
    Closed,

    #[error("Timed out waiting for a datagram")]
    Timeout,
}

impl SocketError {
    /// Whether this error only means "nothing arrived in time"
    pub fn is_timeout(&self) -> bool {
        matches!(self, SocketError::Timeout)
    }
}

/// RFT datagram socket
pub struct DatagramSocket {
    inner: RwLock<Option<UdpSocket>>,
    local_addr: SocketAddr,
}

impl DatagramSocket {
    /// Create a new socket bound to the given address
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;

        let local_addr = socket
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)?;

        debug!(%local_addr, "Socket bound");

        Ok(DatagramSocket {
            inner: RwLock::new(Some(socket.into())),
            local_addr,
        })
    }

    /// Bind to an ephemeral port on the unspecified address matching `peer`'s family
    pub fn bind_for(peer: SocketAddr) -> Result<Self, SocketError> {
        let local: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        Self::bind(local)
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Set how long a receive blocks before reporting [`SocketError::Timeout`]
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), SocketError> {
        self.with_socket(|socket| Ok(socket.set_read_timeout(timeout)?))
    }

    /// Send data to the given address
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        self.with_socket(|socket| Ok(socket.send_to(buf, target)?))
    }

    /// Receive one datagram
    ///
    /// Blocks up to the read timeout.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        self.with_socket(|socket| match socket.recv_from(buf) {
            Ok(result) => Ok(result),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(SocketError::Timeout)
            }
            Err(e) => Err(SocketError::Io(e)),
        })
    }

    /// Close the socket
    ///
    /// Returns `true` the first time; later calls do nothing.
    pub fn close(&self) -> bool {
        let closed = self.inner.write().take().is_some();
        if closed {
            debug!(local_addr = %self.local_addr, "Socket closed");
        }
        closed
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.read().is_none()
    }

    fn with_socket<T>(
        &self,
        f: impl FnOnce(&UdpSocket) -> Result<T, SocketError>,
    ) -> Result<T, SocketError> {
        match self.inner.read().as_ref() {
            Some(socket) => f(socket),
            None => Err(SocketError::Closed),
        }
    }
}

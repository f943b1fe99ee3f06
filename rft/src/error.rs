//! Transfer errors

use rft_io::SocketError;
use rft_protocol::SessionError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that end a transfer
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Failed to persist received file: {0}")]
    Sink(#[source] io::Error),

    #[error("Failed to start worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("No datagram received for {0:?}")]
    Idle(Duration),

    #[error("Event queue disconnected")]
    Disconnected,
}

/// Result type for transfer operations
pub type Result<T> = std::result::Result<T, TransferError>;

//! RFT Packet Structures and Serialization
//!
//! Every datagram the sender emits is a text frame of the form
//! `<seq>:<checksum>:<payload>`, where `seq` and `checksum` are decimal
//! integers and `checksum` is the CRC-32 of the raw payload bytes. The payload
//! itself may contain `:`; parsing only splits on the first two separators.
//!
//! Data packets carry one fixed-size chunk of the file, padded with
//! [`PAD_BYTE`] up to the chunk size. Control packets (`SYN`, the file name,
//! `HASH:<hex>`, `FIN`) are sent unpadded.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Field separator on the wire
pub const SEPARATOR: u8 = b':';

/// Filler byte used to pad short data chunks
pub const PAD_BYTE: u8 = b' ';

/// Default chunk size (bytes of file content per data packet)
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Largest datagram the receiving side reads in one call
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Content of the handshake packet
pub const SYN: &[u8] = b"SYN";

/// Content of the teardown packet
pub const FIN: &[u8] = b"FIN";

/// Prefix of the whole-file hash packet
pub const HASH_PREFIX: &[u8] = b"HASH:";

/// Sequence number of the handshake packet
pub const SYN_SEQ: u32 = 0;

/// Sequence number of the file name packet
pub const NAME_SEQ: u32 = 1;

/// Sequence number of the first data chunk
pub const FIRST_DATA_SEQ: u32 = 2;

/// Calculate the CRC-32 checksum of a payload.
pub fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Check a payload against a received checksum.
#[inline]
pub fn verify(payload: &[u8], expected: u32) -> bool {
    checksum(payload) == expected
}

/// Frame a payload under the given sequence number.
pub fn encode(seq: u32, payload: &[u8]) -> Bytes {
    Packet::new(seq, Bytes::copy_from_slice(payload)).to_bytes()
}

/// Parse a frame into its sequence number, carried checksum and payload.
///
/// The checksum is returned as received; use [`verify`] or
/// [`Packet::is_valid`] to check it.
pub fn decode(bytes: &[u8]) -> Result<Packet, PacketError> {
    Packet::from_bytes(bytes)
}

/// Pad a data chunk with [`PAD_BYTE`] up to `chunk_size`.
///
/// Chunks that are already `chunk_size` long (or longer) are returned as is.
pub fn pad_chunk(chunk: &[u8], chunk_size: usize) -> Bytes {
    if chunk.len() >= chunk_size {
        return Bytes::copy_from_slice(chunk);
    }

    let mut buf = BytesMut::with_capacity(chunk_size);
    buf.put_slice(chunk);
    buf.put_bytes(PAD_BYTE, chunk_size - chunk.len());
    buf.freeze()
}

/// Strip trailing [`PAD_BYTE`]s from a received data chunk.
pub fn strip_padding(chunk: &[u8]) -> &[u8] {
    let end = chunk
        .iter()
        .rposition(|&b| b != PAD_BYTE)
        .map_or(0, |idx| idx + 1);
    &chunk[..end]
}

/// Parse a strictly decimal, unsigned field.
fn parse_decimal(field: &[u8]) -> Option<u32> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(field).ok()?.parse().ok()
}

/// Interpretation of a packet's content as seen by the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content<'a> {
    /// Handshake / resynchronisation marker
    Syn,
    /// Name of the file being transferred (sequence number 1)
    FileName(String),
    /// Hex digest of the whole file
    Hash(String),
    /// End of transfer
    Fin,
    /// A (padded) chunk of file content
    Data(&'a [u8]),
}

/// A single framed packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number assigned by the sender
    pub seq: u32,
    /// CRC-32 of the payload (as carried on the wire)
    pub checksum: u32,
    /// Raw payload
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet, computing the checksum over `payload`
    pub fn new(seq: u32, payload: Bytes) -> Self {
        Packet {
            seq,
            checksum: checksum(&payload),
            payload,
        }
    }

    /// Create an unpadded control packet
    pub fn control(seq: u32, content: impl Into<Bytes>) -> Self {
        Packet::new(seq, content.into())
    }

    /// Create a data packet, padding the chunk before the checksum is computed
    pub fn data(seq: u32, chunk: &[u8], chunk_size: usize) -> Self {
        Packet::new(seq, pad_chunk(chunk, chunk_size))
    }

    /// Create the `HASH:<hex>` control packet
    pub fn hash(seq: u32, hex_digest: &str) -> Self {
        let mut buf = BytesMut::with_capacity(HASH_PREFIX.len() + hex_digest.len());
        buf.put_slice(HASH_PREFIX);
        buf.put_slice(hex_digest.as_bytes());
        Packet::new(seq, buf.freeze())
    }

    /// Whether the carried checksum matches the payload
    #[inline]
    pub fn is_valid(&self) -> bool {
        verify(&self.payload, self.checksum)
    }

    /// Classify the payload
    pub fn content(&self) -> Content<'_> {
        let payload = &self.payload[..];

        if payload == SYN {
            Content::Syn
        } else if self.seq == NAME_SEQ {
            Content::FileName(String::from_utf8_lossy(payload).trim().to_string())
        } else if let Some(digest) = payload.strip_prefix(HASH_PREFIX) {
            Content::Hash(String::from_utf8_lossy(digest).trim().to_string())
        } else if payload == FIN {
            Content::Fin
        } else {
            Content::Data(payload)
        }
    }

    /// Size of the encoded frame
    pub fn size(&self) -> usize {
        // u32::MAX has 10 decimal digits
        10 + 1 + 10 + 1 + self.payload.len()
    }

    /// Serialize the packet to `<seq>:<checksum>:<payload>`
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        buf.put_slice(self.seq.to_string().as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_slice(self.checksum.to_string().as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a packet from a received datagram
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let first = bytes
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or(PacketError::MissingSeparator)?;
        let rest = &bytes[first + 1..];
        let second = rest
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or(PacketError::MissingSeparator)?;

        let seq_field = &bytes[..first];
        let checksum_field = &rest[..second];

        let seq = parse_decimal(seq_field).ok_or_else(|| {
            PacketError::InvalidSequenceNumber(String::from_utf8_lossy(seq_field).into_owned())
        })?;
        let checksum = parse_decimal(checksum_field).ok_or_else(|| {
            PacketError::InvalidChecksum(String::from_utf8_lossy(checksum_field).into_owned())
        })?;

        Ok(Packet {
            seq,
            checksum,
            payload: Bytes::copy_from_slice(&rest[second + 1..]),
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} crc={} '{}'",
            self.seq,
            self.checksum,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

/// Packet parsing errors
///
/// Every variant means the datagram is malformed and must be discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Malformed packet: missing field separator")]
    MissingSeparator,

    #[error("Malformed packet: invalid sequence number {0:?}")]
    InvalidSequenceNumber(String),

    #[error("Malformed packet: invalid checksum {0:?}")]
    InvalidChecksum(String),
}

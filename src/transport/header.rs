//! Packet encoding and decoding for the Convoy transport layer.
//!
//! Every datagram starts with a fixed 9-byte header; the application
//! payload runs to the end of the datagram, so no length field is needed.

use thiserror::Error;

use crate::core::MAX_DATAGRAM_LEN;

/// Size constants for the wire format.
pub mod sizes {
    use super::MAX_DATAGRAM_LEN;

    /// Packet kind size.
    pub const KIND_SIZE: usize = 1;
    /// Sequence number size (16-bit LE).
    pub const SEQUENCE_SIZE: usize = 2;
    /// Acknowledgement field size (16-bit LE).
    pub const ACK_SIZE: usize = 2;
    /// Selective acknowledgement bitfield size (32-bit LE).
    pub const ACK_BITS_SIZE: usize = 4;
    /// Packet header size (kind + sequence + ack + ack_bits).
    pub const HEADER_SIZE: usize = KIND_SIZE + SEQUENCE_SIZE + ACK_SIZE + ACK_BITS_SIZE;
    /// Largest payload that fits a single datagram.
    pub const MAX_PAYLOAD: usize = MAX_DATAGRAM_LEN - HEADER_SIZE;
}

/// Packet kind identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Sequenced application payload.
    Data = 0x01,
    /// Header-only acknowledgement carrier; the sequence field is unused.
    AckOnly = 0x02,
}

impl PacketKind {
    /// Parse packet kind from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Data),
            0x02 => Some(Self::AckOnly),
            _ => None,
        }
    }

    /// Convert packet kind to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Packet header.
///
/// Wire format (9 bytes):
/// ```text
/// +--------+----------------+----------------+------------------+
/// | Kind   | Sequence       | Ack            | Ack Bits         |
/// | 1 byte | 2 bytes (LE16) | 2 bytes (LE16) | 4 bytes (LE32)   |
/// +--------+----------------+----------------+------------------+
/// ```
///
/// `ack` is the next sequence the sender of this packet expects: every
/// sequence strictly before it (in wraparound order) has been received.
/// Bit `i` of `ack_bits` additionally acknowledges `ack + 1 + i`; `ack`
/// itself is by definition still missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Packet kind.
    pub kind: PacketKind,
    /// Sequence number of this packet (data packets only).
    pub sequence: u16,
    /// Cumulative acknowledgement: next sequence expected.
    pub ack: u16,
    /// Selective acknowledgement bitfield above `ack`.
    pub ack_bits: u32,
}

impl PacketHeader {
    /// Create a data packet header.
    pub fn data(sequence: u16, ack: u16, ack_bits: u32) -> Self {
        Self {
            kind: PacketKind::Data,
            sequence,
            ack,
            ack_bits,
        }
    }

    /// Create an ack-only packet header.
    pub fn ack_only(ack: u16, ack_bits: u32) -> Self {
        Self {
            kind: PacketKind::AckOnly,
            sequence: 0,
            ack,
            ack_bits,
        }
    }

    /// Serialize header to bytes (9 bytes).
    pub fn to_bytes(&self) -> [u8; sizes::HEADER_SIZE] {
        let mut buf = [0u8; sizes::HEADER_SIZE];
        buf[0] = self.kind.as_byte();
        buf[1..3].copy_from_slice(&self.sequence.to_le_bytes());
        buf[3..5].copy_from_slice(&self.ack.to_le_bytes());
        buf[5..9].copy_from_slice(&self.ack_bits.to_le_bytes());
        buf
    }

    /// Parse header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < sizes::HEADER_SIZE {
            return Err(HeaderError::Truncated {
                expected: sizes::HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let kind = PacketKind::from_byte(bytes[0]).ok_or(HeaderError::UnknownKind(bytes[0]))?;
        let sequence = u16::from_le_bytes([bytes[1], bytes[2]]);
        let ack = u16::from_le_bytes([bytes[3], bytes[4]]);
        let ack_bits = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);

        Ok(Self {
            kind,
            sequence,
            ack,
            ack_bits,
        })
    }
}

/// Frame a header and payload into a single datagram.
pub fn encode_packet(header: &PacketHeader, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(sizes::HEADER_SIZE + payload.len());
    datagram.extend_from_slice(&header.to_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

/// Split a datagram into its header and payload.
pub fn decode_packet(datagram: &[u8]) -> Result<(PacketHeader, &[u8]), HeaderError> {
    let header = PacketHeader::from_bytes(datagram)?;
    Ok((header, &datagram[sizes::HEADER_SIZE..]))
}

/// Errors that can occur during packet parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Datagram is too short to hold a header.
    #[error("datagram too short: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Unknown packet kind.
    #[error("unknown packet kind: 0x{0:02x}")]
    UnknownKind(u8),
}

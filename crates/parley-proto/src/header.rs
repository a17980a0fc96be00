//! Fixed-size envelope header.
//!
//! Eight bytes in network byte order, read without copying via `zerocopy`.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U32},
};

use crate::error::ProtocolError;

/// Protocol magic, first two bytes of every envelope.
pub const MAGIC: [u8; 2] = *b"PL";

/// Wire version written by this build.
pub const CURRENT_VERSION: u8 = 1;

/// Size of [`EnvelopeHeader`] in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload accepted or produced (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1 << 20;

/// Kind of message carried in an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Ordinary ratchet message.
    Ratchet = 1,
    /// Initial message that also establishes a session.
    PreKey = 2,
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ratchet),
            2 => Ok(Self::PreKey),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// Envelope header preceding every CBOR payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct EnvelopeHeader {
    magic: [u8; 2],
    version: u8,
    kind: u8,
    payload_len: U32<BigEndian>,
}

impl EnvelopeHeader {
    /// Header for a payload of `payload_len` bytes at the current version.
    pub fn new(kind: MessageKind, payload_len: u32) -> Self {
        Self {
            magic: MAGIC,
            version: CURRENT_VERSION,
            kind: kind as u8,
            payload_len: U32::new(payload_len),
        }
    }

    /// Split `bytes` into a validated header and the remaining input.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        let (header, rest) = Self::read_from_prefix(bytes)
            .map_err(|_| ProtocolError::Truncated { expected: HEADER_SIZE, actual: bytes.len() })?;

        if header.magic != MAGIC {
            return Err(ProtocolError::BadMagic(header.magic));
        }
        if header.version != CURRENT_VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }
        MessageKind::try_from(header.kind)?;

        let len = header.payload_len();
        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: len, max: MAX_PAYLOAD_SIZE });
        }

        Ok((header, rest))
    }

    /// Wire version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Message kind. Only meaningful on headers returned by [`Self::parse`]
    /// or built with [`Self::new`].
    pub fn kind(&self) -> Result<MessageKind, ProtocolError> {
        MessageKind::try_from(self.kind)
    }

    /// Declared payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload_len.get() as usize
    }
}

//! Wire format errors.

use thiserror::Error;

/// Errors from encoding or decoding wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Input ended before the envelope or payload was complete.
    #[error("truncated message: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Envelope did not start with the protocol magic.
    #[error("bad magic: {0:02x?}")]
    BadMagic([u8; 2]),

    /// Envelope version is not one this build understands.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Envelope kind byte is unknown.
    #[error("unknown message kind: {0}")]
    UnknownKind(u8),

    /// Payload length exceeds the protocol maximum.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Declared or actual payload size.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },

    /// Bytes remained after the declared payload.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// Payload serialization failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Payload deserialization failed.
    #[error("decode error: {0}")]
    Decode(String),
}

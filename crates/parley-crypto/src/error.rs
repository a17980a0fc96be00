//! Cryptographic error types.

use thiserror::Error;

/// Errors from the primitive adapter and the key hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key material had the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// Bytes do not encode a valid Ed25519 identity key.
    #[error("invalid identity key encoding")]
    InvalidIdentityKey,

    /// Signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,

    /// Diffie-Hellman produced the all-zero output (low-order public key).
    #[error("non-contributory key agreement")]
    NonContributoryAgreement,

    /// HKDF or HMAC rejected its input.
    #[error("key derivation failed")]
    KeyDerivation,

    /// Chain index would overflow.
    #[error("chain exhausted at index {index}")]
    ChainExhausted {
        /// Index of the chain key that cannot be advanced.
        index: u32,
    },

    /// AEAD encryption failed.
    #[error("encryption failed")]
    Encryption,

    /// AEAD tag did not verify.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Randomness source failed.
    #[error("entropy source failed: {0}")]
    Entropy(String),
}

impl CryptoError {
    /// Returns true if this error indicates a malfunctioning primitive rather
    /// than hostile or corrupted input.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::KeyDerivation
            | Self::Encryption
            | Self::Entropy(_)
            | Self::ChainExhausted { .. } => true,

            Self::InvalidKeyLength { .. }
            | Self::InvalidIdentityKey
            | Self::InvalidSignature
            | Self::NonContributoryAgreement
            | Self::AuthenticationFailed => false,
        }
    }
}

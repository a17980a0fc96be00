//! Session error types.

use parley_crypto::CryptoError;
use parley_proto::ProtocolError;
use thiserror::Error;

use crate::{address::ProtocolAddress, store::StoreError};

/// Errors from building sessions and encrypting or decrypting messages.
///
/// None of these leave a partially updated session behind: the record is
/// persisted only after an operation has fully succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Signed pre-key signature did not verify against the bundle identity.
    #[error("invalid signed pre-key signature")]
    InvalidSignature,

    /// Initial message referenced a one-time pre-key we do not hold.
    #[error("unknown one-time pre-key: {pre_key_id}")]
    UnknownPreKeyIdentifier {
        /// Referenced identifier.
        pre_key_id: u32,
    },

    /// Initial message referenced a signed pre-key we do not hold.
    #[error("unknown signed pre-key: {signed_pre_key_id}")]
    UnknownSignedPreKey {
        /// Referenced identifier.
        signed_pre_key_id: u32,
    },

    /// Message counter is further ahead than the skip limit allows.
    #[error("too many skipped messages: chain at {current}, message at {requested} (max skip {max_skip})")]
    TooManySkippedMessages {
        /// Next expected index of the chain.
        current: u32,
        /// Index carried by the message.
        requested: u32,
        /// Configured limit.
        max_skip: u32,
    },

    /// Message key for this counter was already used.
    #[error("duplicate message: counter {counter}")]
    DuplicateMessage {
        /// Counter carried by the message.
        counter: u32,
    },

    /// Ciphertext or associated data failed authentication.
    #[error("message authentication failed")]
    AuthenticationFailed,

    /// Initial message is structurally malformed.
    #[error("invalid initial message: {reason}")]
    InvalidInitialMessage {
        /// What was wrong with it.
        reason: String,
    },

    /// Remote key material was rejected (bad length, bad point, or a
    /// non-contributory agreement).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(CryptoError),

    /// A cryptographic primitive malfunctioned.
    #[error("crypto primitive failure: {0}")]
    CryptoPrimitiveFailure(CryptoError),

    /// The identity store does not trust this remote identity.
    #[error("untrusted identity for {address}")]
    UntrustedIdentity {
        /// Remote device.
        address: ProtocolAddress,
    },

    /// No session exists for this remote device.
    #[error("no session for {address}")]
    NoSession {
        /// Remote device.
        address: ProtocolAddress,
    },

    /// No session state in the record accepted the message.
    #[error("no valid session state")]
    NoValidSession,

    /// Decrypted plaintext had malformed padding.
    #[error("invalid message padding")]
    InvalidPadding,

    /// Session limits are inconsistent.
    #[error("invalid session config: {reason}")]
    InvalidConfig {
        /// Which limit is wrong.
        reason: String,
    },

    /// Wire encoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors point at a broken primitive, store or configuration.
    /// Everything else rejects a single message or bundle and leaves the
    /// session usable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::CryptoPrimitiveFailure(_) | Self::Store(_) | Self::InvalidConfig { .. } => true,

            Self::InvalidSignature
            | Self::UnknownPreKeyIdentifier { .. }
            | Self::UnknownSignedPreKey { .. }
            | Self::TooManySkippedMessages { .. }
            | Self::DuplicateMessage { .. }
            | Self::AuthenticationFailed
            | Self::InvalidInitialMessage { .. }
            | Self::InvalidKeyMaterial(_)
            | Self::UntrustedIdentity { .. }
            | Self::NoSession { .. }
            | Self::NoValidSession
            | Self::InvalidPadding
            | Self::Protocol(_) => false,
        }
    }
}

impl From<CryptoError> for SessionError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => Self::AuthenticationFailed,
            CryptoError::InvalidSignature => Self::InvalidSignature,
            CryptoError::InvalidKeyLength { .. }
            | CryptoError::InvalidIdentityKey
            | CryptoError::NonContributoryAgreement => Self::InvalidKeyMaterial(err),
            CryptoError::KeyDerivation
            | CryptoError::ChainExhausted { .. }
            | CryptoError::Encryption
            | CryptoError::Entropy(_) => Self::CryptoPrimitiveFailure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_rejections_are_not_fatal() {
        assert!(!SessionError::DuplicateMessage { counter: 3 }.is_fatal());
        assert!(!SessionError::AuthenticationFailed.is_fatal());
        assert!(!SessionError::UnknownPreKeyIdentifier { pre_key_id: 5 }.is_fatal());
    }

    #[test]
    fn primitive_failure_is_fatal() {
        let err = SessionError::from(CryptoError::KeyDerivation);
        assert!(matches!(err, SessionError::CryptoPrimitiveFailure(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn crypto_errors_map_to_session_taxonomy() {
        assert_eq!(
            SessionError::from(CryptoError::AuthenticationFailed),
            SessionError::AuthenticationFailed
        );
        assert_eq!(
            SessionError::from(CryptoError::InvalidSignature),
            SessionError::InvalidSignature
        );
        assert!(matches!(
            SessionError::from(CryptoError::NonContributoryAgreement),
            SessionError::InvalidKeyMaterial(_)
        ));
    }

    #[test]
    fn error_display() {
        let err =
            SessionError::TooManySkippedMessages { current: 0, requested: 2001, max_skip: 2000 };
        assert_eq!(
            err.to_string(),
            "too many skipped messages: chain at 0, message at 2001 (max skip 2000)"
        );

        let err = SessionError::NoSession { address: ProtocolAddress::new("bob", 1) };
        assert_eq!(err.to_string(), "no session for bob.1");
    }
}

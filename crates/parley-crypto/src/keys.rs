//! Curve25519 key material.
//!
//! Ratchet, pre-key and ephemeral keys are X25519 key pairs. Identity keys
//! are Ed25519 signing keys; their Montgomery form doubles as the identity
//! agreement key, so a single long-term key signs pre-keys and also takes
//! part in the initial key agreement.
//!
//! # Security
//!
//! - **Debug Redaction**: `PrivateKey` and `IdentityKeyPair` never print
//!   their secret bytes.
//! - **Zeroization**: private key bytes are wiped when dropped.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as AgreementPublic, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Length of every public key, private key and agreement output.
pub const KEY_LENGTH: usize = 32;

/// Length of an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey([u8; KEY_LENGTH]);

impl PublicKey {
    /// Wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a public key from a slice, checking its length.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let actual = bytes.len();
        let bytes: [u8; KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength { expected: KEY_LENGTH, actual })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [b0, b1, b2, b3, ..] = self.0;
        write!(f, "PublicKey({b0:02x}{b1:02x}{b2:02x}{b3:02x}..)")
    }
}

/// X25519 private key.
///
/// Stored unclamped; clamping happens inside the agreement primitive.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; KEY_LENGTH]);

impl PrivateKey {
    /// Build a private key from 32 caller-supplied random bytes.
    pub fn from_seed(seed: [u8; KEY_LENGTH]) -> Self {
        Self(seed)
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(self.0);
        PublicKey(AgreementPublic::from(&secret).to_bytes())
    }

    /// X25519 agreement with a remote public key.
    ///
    /// Rejects the all-zero output produced by low-order points.
    pub fn agree(&self, their_public: &PublicKey) -> Result<[u8; KEY_LENGTH], CryptoError> {
        let secret = StaticSecret::from(self.0);
        let shared = secret.diffie_hellman(&AgreementPublic::from(their_public.0));
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributoryAgreement);
        }
        Ok(shared.to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// X25519 key pair used for ratchet keys, pre-keys and ephemeral keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyPair {
    /// Public half.
    pub public_key: PublicKey,
    /// Private half.
    pub private_key: PrivateKey,
}

impl KeyPair {
    /// Build a key pair from 32 caller-supplied random bytes.
    pub fn from_seed(seed: [u8; KEY_LENGTH]) -> Self {
        let private_key = PrivateKey::from_seed(seed);
        Self { public_key: private_key.public_key(), private_key }
    }
}

/// Long-term public identity of a party.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey(VerifyingKey);

impl IdentityKey {
    /// Parse an identity key, rejecting bytes that are not a valid point.
    pub fn from_bytes(bytes: &[u8; KEY_LENGTH]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(bytes).map(Self).map_err(|_| CryptoError::InvalidIdentityKey)
    }

    /// Compressed Edwards encoding.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        self.0.as_bytes()
    }

    /// The identity key in its X25519 (Montgomery) form.
    pub fn agreement_key(&self) -> PublicKey {
        PublicKey(self.0.to_montgomery().to_bytes())
    }

    /// Verify an Ed25519 signature made by this identity.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &[u8; SIGNATURE_LENGTH],
    ) -> Result<(), CryptoError> {
        let signature = Signature::from_bytes(signature);
        self.0.verify_strict(message, &signature).map_err(|_| CryptoError::InvalidSignature)
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [b0, b1, b2, b3, ..] = *self.0.as_bytes();
        write!(f, "IdentityKey({b0:02x}{b1:02x}{b2:02x}{b3:02x}..)")
    }
}

/// Long-term identity key pair. Owned by the local identity store.
#[derive(Clone)]
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    /// Build an identity from 32 caller-supplied random bytes.
    pub fn from_seed(seed: [u8; KEY_LENGTH]) -> Self {
        Self { signing_key: SigningKey::from_bytes(&seed) }
    }

    /// Public identity key.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey(self.signing_key.verifying_key())
    }

    /// Sign a message (used for signed pre-keys).
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// The identity private key in its X25519 form.
    ///
    /// Pairs with [`IdentityKey::agreement_key`].
    pub fn agreement_key(&self) -> PrivateKey {
        PrivateKey(self.signing_key.to_scalar_bytes())
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("identity_key", &self.identity_key())
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

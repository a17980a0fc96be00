//! Key hierarchy: root keys, chain keys and message keys.
//!
//! All derivations here are pure functions over secret byte strings.
//!
//! # Derivations
//!
//! ```text
//! ratchet_root:   HKDF(salt = RootKey, ikm = DH output, info = ROOT_INFO)
//!                   -> RootKey' ‖ ChainKey'[0]
//!
//! advance_chain:  HMAC(ChainKey[n], 0x02) -> ChainKey[n+1]
//!                 HMAC(ChainKey[n], 0x01) -> seed
//!                 HKDF(ikm = seed, info = MESSAGE_INFO)
//!                   -> cipher key ‖ nonce = MessageKey[n]
//! ```
//!
//! # Invariants
//!
//! - A chain key is never used directly as a message key
//! - Chain stepping is one-way (HMAC preimage resistance)
//! - Each step increments the index by exactly one

use std::fmt;

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Size of root and chain keys.
pub const SECRET_SIZE: usize = 32;

/// Size of the AEAD key inside a message key.
pub const CIPHER_KEY_SIZE: usize = 32;

/// Size of the XChaCha20 nonce inside a message key.
pub const NONCE_SIZE: usize = 24;

/// HMAC input deriving the message-key seed.
const MESSAGE_KEY_SEED: u8 = 0x01;

/// HMAC input deriving the next chain key.
const CHAIN_KEY_SEED: u8 = 0x02;

/// Info label for the Diffie-Hellman ratchet step.
const ROOT_INFO: &[u8] = b"parley v1 root ratchet";

/// Info label for expanding a message-key seed.
const MESSAGE_INFO: &[u8] = b"parley v1 message keys";

/// Info label for the initial agreement.
const INITIAL_INFO: &[u8] = b"parley v1 initial agreement";

/// Domain-separating prefix mixed in front of the initial agreements.
const INITIAL_DISCONTINUITY: [u8; SECRET_SIZE] = [0xFF; SECRET_SIZE];

/// Root of the key hierarchy. Replaced on every Diffie-Hellman ratchet step.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RootKey([u8; SECRET_SIZE]);

impl RootKey {
    /// Wrap root key bytes.
    pub fn new(key: [u8; SECRET_SIZE]) -> Self {
        Self(key)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_SIZE] {
        &self.0
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootKey(<redacted>)")
    }
}

/// Chain key plus its position in the chain.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ChainKey {
    key: [u8; SECRET_SIZE],
    index: u32,
}

impl ChainKey {
    /// Create a chain key at a given index.
    pub fn new(key: [u8; SECRET_SIZE], index: u32) -> Self {
        Self { key, index }
    }

    /// Index of the message key this chain key will produce next.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_SIZE] {
        &self.key
    }
}

impl fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKey").field("key", &"<redacted>").field("index", &self.index).finish()
    }
}

/// Single-use message key: AEAD key, nonce and chain index.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey {
    cipher_key: [u8; CIPHER_KEY_SIZE],
    nonce: [u8; NONCE_SIZE],
    index: u32,
}

impl MessageKey {
    /// Chain index this key was derived at.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// AEAD key bytes.
    pub fn cipher_key(&self) -> &[u8; CIPHER_KEY_SIZE] {
        &self.cipher_key
    }

    /// AEAD nonce bytes.
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }
}

impl fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageKey")
            .field("key", &"<redacted>")
            .field("index", &self.index)
            .finish()
    }
}

/// Diffie-Hellman ratchet step on the root key.
///
/// Derives a new root key and a fresh chain key at index 0 from the current
/// root key and a new agreement output.
pub fn ratchet_root(
    root_key: &RootKey,
    dh_output: &[u8; SECRET_SIZE],
) -> Result<(RootKey, ChainKey), CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(Some(root_key.as_bytes()), dh_output);
    split_root_and_chain(&hkdf, ROOT_INFO)
}

/// Symmetric ratchet step.
///
/// Returns the next chain key and the message key for the current index.
pub fn advance_chain(chain_key: &ChainKey) -> Result<(ChainKey, MessageKey), CryptoError> {
    let next_index = chain_key
        .index
        .checked_add(1)
        .ok_or(CryptoError::ChainExhausted { index: chain_key.index })?;

    let next_key = hmac_step(&chain_key.key, CHAIN_KEY_SEED)?;
    let mut seed = hmac_step(&chain_key.key, MESSAGE_KEY_SEED)?;

    let hkdf = Hkdf::<Sha256>::new(None, &seed);
    seed.zeroize();

    let mut okm = [0u8; CIPHER_KEY_SIZE + NONCE_SIZE];
    hkdf.expand(MESSAGE_INFO, &mut okm).map_err(|_| CryptoError::KeyDerivation)?;

    let mut message_key = MessageKey {
        cipher_key: [0u8; CIPHER_KEY_SIZE],
        nonce: [0u8; NONCE_SIZE],
        index: chain_key.index,
    };
    message_key.cipher_key.copy_from_slice(&okm[..CIPHER_KEY_SIZE]);
    message_key.nonce.copy_from_slice(&okm[CIPHER_KEY_SIZE..]);
    okm.zeroize();

    Ok((ChainKey::new(next_key, next_index), message_key))
}

/// Derive the initial root key and chain key from the concatenated
/// agreement outputs of the initial handshake.
pub fn derive_initial_secrets(agreements: &[u8]) -> Result<(RootKey, ChainKey), CryptoError> {
    let mut ikm = Vec::with_capacity(SECRET_SIZE + agreements.len());
    ikm.extend_from_slice(&INITIAL_DISCONTINUITY);
    ikm.extend_from_slice(agreements);

    let salt = [0u8; SECRET_SIZE];
    let hkdf = Hkdf::<Sha256>::new(Some(&salt), &ikm);
    ikm.zeroize();

    split_root_and_chain(&hkdf, INITIAL_INFO)
}

fn split_root_and_chain(
    hkdf: &Hkdf<Sha256>,
    info: &[u8],
) -> Result<(RootKey, ChainKey), CryptoError> {
    let mut okm = [0u8; 2 * SECRET_SIZE];
    hkdf.expand(info, &mut okm).map_err(|_| CryptoError::KeyDerivation)?;

    let mut root = [0u8; SECRET_SIZE];
    let mut chain = [0u8; SECRET_SIZE];
    root.copy_from_slice(&okm[..SECRET_SIZE]);
    chain.copy_from_slice(&okm[SECRET_SIZE..]);
    okm.zeroize();

    Ok((RootKey::new(root), ChainKey::new(chain, 0)))
}

fn hmac_step(key: &[u8; SECRET_SIZE], input: u8) -> Result<[u8; SECRET_SIZE], CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| CryptoError::KeyDerivation)?;
    mac.update(&[input]);
    let digest = mac.finalize().into_bytes();

    let mut out = [0u8; SECRET_SIZE];
    out.copy_from_slice(&digest);
    Ok(out)
}

//! Parley Cryptographic Primitives
//!
//! Cryptographic building blocks for the Parley pairwise session protocol.
//! Pure functions with deterministic outputs. Callers provide the random
//! seeds for every generated key, which keeps the crate Sans-IO and lets the
//! simulation harness replay a conversation byte-for-byte.
//!
//! # Key Hierarchy
//!
//! ```text
//! X3DH agreements (DH1 ‖ DH2 ‖ DH3 [‖ DH4])
//!        │
//!        ▼ HKDF
//! RootKey ──────────────┐
//!        │              │ ratchet_root(RootKey, DH(ratchet keys))
//!        ▼              ▼
//! ChainKey[0]      RootKey', ChainKey'[0]
//!        │
//!        ▼ advance_chain (HMAC 0x02 / 0x01)
//! ChainKey[n+1] + MessageKey[n]
//!        │
//!        ▼
//! XChaCha20-Poly1305 Ciphertext
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain stepping is one-way: `ChainKey[n+1]` does not reveal `ChainKey[n]`
//! - Message keys are single-use and zeroized when dropped
//!
//! Break-in Recovery:
//! - Every Diffie-Hellman ratchet step mixes fresh agreement output into the
//!   root key, so a stolen chain key stops being useful after the next step
//!
//! Authenticity:
//! - AEAD tag binds ciphertext to the ratchet position carried in the
//!   associated data
//! - Failed authentication tag -> reject message

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod keys;

pub use aead::{open, seal};
pub use error::CryptoError;
pub use kdf::{
    ChainKey, MessageKey, RootKey, advance_chain, derive_initial_secrets, ratchet_root,
};
pub use keys::{
    IdentityKey, IdentityKeyPair, KEY_LENGTH, KeyPair, PrivateKey, PublicKey, SIGNATURE_LENGTH,
};

//! Persistence contracts.
//!
//! The protocol depends only on these traits. Methods take `&self`;
//! implementations use interior mutability and must be `Sync` if shared.
//! None of them serialize operations per device, which stays the caller's
//! job.

mod memory;

use parley_crypto::{IdentityKey, IdentityKeyPair};
use thiserror::Error;

pub use memory::MemoryStore;

use crate::{
    address::ProtocolAddress,
    bundle::{PreKeyRecord, SignedPreKeyRecord},
    state::SessionRecord,
};

/// Errors from store backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    /// Record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Local identity and the trust decisions about remote identities.
pub trait IdentityKeyStore {
    /// The local identity key pair.
    fn identity_key_pair(&self) -> Result<IdentityKeyPair, StoreError>;

    /// Whether `identity` is acceptable for `address`.
    fn is_trusted_identity(
        &self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
    ) -> Result<bool, StoreError>;

    /// Remember `identity` for `address`. Returns true if it replaced a
    /// different key.
    fn save_identity(
        &self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
    ) -> Result<bool, StoreError>;

    /// The identity saved for `address`, if any.
    fn identity(&self, address: &ProtocolAddress) -> Result<Option<IdentityKey>, StoreError>;
}

/// One-time pre-keys.
pub trait PreKeyStore {
    /// Load a one-time pre-key.
    fn load_pre_key(&self, id: u32) -> Result<Option<PreKeyRecord>, StoreError>;

    /// Store a one-time pre-key.
    fn store_pre_key(&self, record: PreKeyRecord) -> Result<(), StoreError>;

    /// Delete a consumed one-time pre-key.
    fn remove_pre_key(&self, id: u32) -> Result<(), StoreError>;
}

/// Signed pre-keys.
pub trait SignedPreKeyStore {
    /// Load a signed pre-key.
    fn load_signed_pre_key(&self, id: u32) -> Result<Option<SignedPreKeyRecord>, StoreError>;

    /// Store a signed pre-key.
    fn store_signed_pre_key(&self, record: SignedPreKeyRecord) -> Result<(), StoreError>;
}

/// Session records addressed by remote device.
pub trait SessionStore {
    /// Load the record for `address`.
    fn load_session(&self, address: &ProtocolAddress) -> Result<Option<SessionRecord>, StoreError>;

    /// Persist the record for `address`, replacing any previous one.
    fn store_session(
        &self,
        address: &ProtocolAddress,
        record: &SessionRecord,
    ) -> Result<(), StoreError>;
}

/// Everything a session builder or cipher needs.
pub trait ProtocolStore: IdentityKeyStore + PreKeyStore + SignedPreKeyStore + SessionStore {}

impl<T: IdentityKeyStore + PreKeyStore + SignedPreKeyStore + SessionStore> ProtocolStore for T {}

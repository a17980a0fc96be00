//! In-memory store for tests and simulation.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use parley_crypto::{IdentityKey, IdentityKeyPair};

use super::{IdentityKeyStore, PreKeyStore, SessionStore, SignedPreKeyStore, StoreError};
use crate::{
    address::ProtocolAddress,
    bundle::{PreKeyRecord, SignedPreKeyRecord},
    state::SessionRecord,
};

/// Store holding everything in memory.
///
/// Sessions are kept as serialized bytes so every load returns an
/// independent copy, the same as a real backend would. Remote identities
/// follow trust-on-first-use: an address with no saved identity trusts
/// whatever it is shown first; afterwards only the saved key is trusted.
#[derive(Debug)]
pub struct MemoryStore {
    identity: IdentityKeyPair,
    identities: RwLock<HashMap<ProtocolAddress, IdentityKey>>,
    pre_keys: RwLock<HashMap<u32, PreKeyRecord>>,
    signed_pre_keys: RwLock<HashMap<u32, SignedPreKeyRecord>>,
    sessions: RwLock<HashMap<ProtocolAddress, Vec<u8>>>,
}

impl MemoryStore {
    /// Empty store for `identity`.
    pub fn new(identity: IdentityKeyPair) -> Self {
        Self {
            identity,
            identities: RwLock::new(HashMap::new()),
            pre_keys: RwLock::new(HashMap::new()),
            signed_pre_keys: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of one-time pre-keys held.
    pub fn pre_key_count(&self) -> Result<usize, StoreError> {
        Ok(self.pre_keys.read().map_err(poisoned)?.len())
    }

    /// Number of remote devices with a stored session.
    pub fn session_count(&self) -> Result<usize, StoreError> {
        Ok(self.sessions.read().map_err(poisoned)?.len())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Poisoned
}

impl IdentityKeyStore for MemoryStore {
    fn identity_key_pair(&self) -> Result<IdentityKeyPair, StoreError> {
        Ok(self.identity.clone())
    }

    fn is_trusted_identity(
        &self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
    ) -> Result<bool, StoreError> {
        let identities = self.identities.read().map_err(poisoned)?;
        Ok(identities.get(address).is_none_or(|known| known == identity))
    }

    fn save_identity(
        &self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
    ) -> Result<bool, StoreError> {
        let mut identities = self.identities.write().map_err(poisoned)?;
        let replaced = identities.insert(address.clone(), *identity);
        Ok(replaced.is_some_and(|old| old != *identity))
    }

    fn identity(&self, address: &ProtocolAddress) -> Result<Option<IdentityKey>, StoreError> {
        Ok(self.identities.read().map_err(poisoned)?.get(address).copied())
    }
}

impl PreKeyStore for MemoryStore {
    fn load_pre_key(&self, id: u32) -> Result<Option<PreKeyRecord>, StoreError> {
        Ok(self.pre_keys.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn store_pre_key(&self, record: PreKeyRecord) -> Result<(), StoreError> {
        self.pre_keys.write().map_err(poisoned)?.insert(record.id, record);
        Ok(())
    }

    fn remove_pre_key(&self, id: u32) -> Result<(), StoreError> {
        self.pre_keys.write().map_err(poisoned)?.remove(&id);
        Ok(())
    }
}

impl SignedPreKeyStore for MemoryStore {
    fn load_signed_pre_key(&self, id: u32) -> Result<Option<SignedPreKeyRecord>, StoreError> {
        Ok(self.signed_pre_keys.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn store_signed_pre_key(&self, record: SignedPreKeyRecord) -> Result<(), StoreError> {
        self.signed_pre_keys.write().map_err(poisoned)?.insert(record.id, record);
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn load_session(&self, address: &ProtocolAddress) -> Result<Option<SessionRecord>, StoreError> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        sessions.get(address).map(Vec::as_slice).map(SessionRecord::from_bytes).transpose()
    }

    fn store_session(
        &self,
        address: &ProtocolAddress,
        record: &SessionRecord,
    ) -> Result<(), StoreError> {
        let bytes = record.to_bytes()?;
        self.sessions.write().map_err(poisoned)?.insert(address.clone(), bytes);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::env::testing::CountingEnv;

    fn store() -> MemoryStore {
        MemoryStore::new(IdentityKeyPair::from_seed([1u8; 32]))
    }

    #[test]
    fn first_identity_is_trusted_then_pinned() {
        let store = store();
        let bob = ProtocolAddress::new("bob", 1);
        let key = IdentityKeyPair::from_seed([2u8; 32]).identity_key();
        let other = IdentityKeyPair::from_seed([3u8; 32]).identity_key();

        assert!(store.is_trusted_identity(&bob, &key).unwrap());
        assert!(!store.save_identity(&bob, &key).unwrap());

        assert!(store.is_trusted_identity(&bob, &key).unwrap());
        assert!(!store.is_trusted_identity(&bob, &other).unwrap());
        assert_eq!(store.identity(&bob).unwrap(), Some(key));
    }

    #[test]
    fn saving_different_identity_reports_replacement() {
        let store = store();
        let bob = ProtocolAddress::new("bob", 1);
        let key = IdentityKeyPair::from_seed([2u8; 32]).identity_key();
        let other = IdentityKeyPair::from_seed([3u8; 32]).identity_key();

        store.save_identity(&bob, &key).unwrap();
        assert!(store.save_identity(&bob, &other).unwrap());
    }

    #[test]
    fn pre_key_lifecycle() {
        let store = store();
        let env = CountingEnv::default();
        store.store_pre_key(PreKeyRecord::generate(5, &env).unwrap()).unwrap();

        assert!(store.load_pre_key(5).unwrap().is_some());
        assert_eq!(store.pre_key_count().unwrap(), 1);

        store.remove_pre_key(5).unwrap();
        assert!(store.load_pre_key(5).unwrap().is_none());
    }

    #[test]
    fn missing_session_is_none() {
        let store = store();
        assert!(store.load_session(&ProtocolAddress::new("bob", 1)).unwrap().is_none());
        assert_eq!(store.session_count().unwrap(), 0);
    }
}

//! A simulated protocol participant.

use bytes::Bytes;
use parley_core::{
    Environment, MemoryStore, PreKeyBundle, PreKeyRecord, PreKeyStore, ProtocolAddress,
    SessionBuilder, SessionCipher, SessionConfig, SessionError, SignedPreKeyRecord,
    SignedPreKeyStore, pad, unpad,
};
use parley_crypto::IdentityKeyPair;

use crate::sim_env::SimEnv;

/// Signed pre-key identifier every party publishes.
pub const SIGNED_PRE_KEY_ID: u32 = 1;

/// One device with its own identity and store.
///
/// Plaintexts are padded before encryption and unpadded after decryption,
/// the way an application would use the session layer.
pub struct Party {
    address: ProtocolAddress,
    store: MemoryStore,
    env: SimEnv,
    config: SessionConfig,
    signed_pre_key: SignedPreKeyRecord,
}

impl Party {
    /// New party named `name` (device 1) with default limits.
    pub fn new(name: &str, env: SimEnv) -> Result<Self, SessionError> {
        Self::with_config(name, env, SessionConfig::default())
    }

    /// New party with explicit limits.
    pub fn with_config(
        name: &str,
        env: SimEnv,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let identity = IdentityKeyPair::from_seed(env.random_seed()?);
        let signed_pre_key = SignedPreKeyRecord::generate(SIGNED_PRE_KEY_ID, &identity, &env)?;

        let store = MemoryStore::new(identity);
        store.store_signed_pre_key(signed_pre_key.clone())?;

        Ok(Self { address: ProtocolAddress::new(name, 1), store, env, config, signed_pre_key })
    }

    /// This party's address.
    pub fn address(&self) -> &ProtocolAddress {
        &self.address
    }

    /// Backing store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Identity key pair.
    pub fn identity(&self) -> Result<IdentityKeyPair, SessionError> {
        use parley_core::IdentityKeyStore;
        Ok(self.store.identity_key_pair()?)
    }

    /// Publish a bundle, generating one-time pre-key `one_time_id` if given.
    pub fn publish_bundle(&self, one_time_id: Option<u32>) -> Result<PreKeyBundle, SessionError> {
        let one_time = one_time_id.map(|id| PreKeyRecord::generate(id, &self.env)).transpose()?;
        let bundle = PreKeyBundle::from_records(
            self.identity()?.identity_key(),
            &self.signed_pre_key,
            one_time.as_ref(),
        );
        if let Some(record) = one_time {
            self.store.store_pre_key(record)?;
        }
        Ok(bundle)
    }

    /// Start a session with `remote` from its bundle.
    pub fn start_session(
        &self,
        remote: &ProtocolAddress,
        bundle: &PreKeyBundle,
    ) -> Result<(), SessionError> {
        SessionBuilder::with_config(&self.store, remote.clone(), self.env.clone(), self.config)?
            .process_pre_key_bundle(bundle)
    }

    /// Session cipher for `remote`.
    pub fn cipher(
        &self,
        remote: &ProtocolAddress,
    ) -> Result<SessionCipher<'_, MemoryStore, SimEnv>, SessionError> {
        SessionCipher::with_config(&self.store, remote.clone(), self.env.clone(), self.config)
    }

    /// Pad, encrypt and encode a message for `remote`.
    pub fn send(&self, remote: &ProtocolAddress, plaintext: &[u8]) -> Result<Bytes, SessionError> {
        let message = self.cipher(remote)?.encrypt(&pad(plaintext))?;
        Ok(message.encode()?)
    }

    /// Decode, decrypt and unpad a message from `remote`.
    pub fn receive(&self, remote: &ProtocolAddress, bytes: &[u8]) -> Result<Vec<u8>, SessionError> {
        let padded = self.cipher(remote)?.decrypt_bytes(bytes)?;
        Ok(unpad(&padded)?.to_vec())
    }

    /// Whether one-time pre-key `id` is still held.
    pub fn has_pre_key(&self, id: u32) -> Result<bool, SessionError> {
        Ok(self.store.load_pre_key(id)?.is_some())
    }
}

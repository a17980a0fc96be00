//! Per-message encryption and decryption.
//!
//! # Associated Data
//!
//! Every ciphertext is bound to its ratchet position:
//!
//! ```text
//! version ‖ sender identity ‖ receiver identity
//!         ‖ sender ratchet key ‖ receiver ratchet key
//!         ‖ counter (BE) ‖ previous counter (BE)
//! ```
//!
//! # Atomicity
//!
//! Record-level operations work on clones of session states and write the
//! winning clone back only on success, so a rejected message never changes
//! the record. [`SessionCipher`] additionally persists only after success,
//! and once a record is stored the plaintext is returned: removing a consumed
//! one-time pre-key afterwards is best effort.

use parley_crypto::{IdentityKey, PublicKey, open, seal};
use parley_proto::{CiphertextMessage, PreKeyMessage, RatchetMessage};

use crate::{
    address::ProtocolAddress,
    builder::build_for_incoming,
    config::SessionConfig,
    env::Environment,
    error::SessionError,
    state::{SessionRecord, SessionState},
    store::{IdentityKeyStore, PreKeyStore, ProtocolStore, SessionStore},
};

/// Encrypt with the record's current state.
///
/// Produces a [`CiphertextMessage::PreKey`] while the remote side has not yet
/// replied, otherwise a [`CiphertextMessage::Ratchet`].
pub fn encrypt_record(
    record: &mut SessionRecord,
    plaintext: &[u8],
) -> Result<CiphertextMessage, SessionError> {
    let mut state = record.current().cloned().ok_or(SessionError::NoValidSession)?;
    let message = encrypt_state(&mut state, plaintext)?;
    record.set_current(state);
    Ok(message)
}

/// Decrypt against the record: current state first, then archived states
/// newest to oldest.
///
/// A state that reports [`SessionError::DuplicateMessage`] ends the search;
/// the message was already consumed. A successful archived state is promoted
/// to current. If no state accepts the message, the first error is returned.
pub fn decrypt_record<E: Environment>(
    record: &mut SessionRecord,
    message: &RatchetMessage,
    env: &E,
    config: &SessionConfig,
) -> Result<Vec<u8>, SessionError> {
    let mut first_error = None;

    if let Some(current) = record.current() {
        let mut candidate = current.clone();
        match decrypt_state(&mut candidate, message, env, config) {
            Ok(plaintext) => {
                record.set_current(candidate);
                return Ok(plaintext);
            },
            Err(err @ SessionError::DuplicateMessage { .. }) => return Err(err),
            Err(err) => first_error = Some(err),
        }
    }

    let mut winner = None;
    for (index, previous) in record.previous_states().enumerate() {
        let mut candidate = previous.clone();
        match decrypt_state(&mut candidate, message, env, config) {
            Ok(plaintext) => {
                winner = Some((index, candidate, plaintext));
                break;
            },
            Err(err @ SessionError::DuplicateMessage { .. }) => return Err(err),
            Err(err) => {
                first_error.get_or_insert(err);
            },
        }
    }

    if let Some((index, state, plaintext)) = winner {
        tracing::debug!(index, "archived session state accepted message");
        record.promote_old_state(index, state, config.max_archived_states);
        return Ok(plaintext);
    }

    Err(first_error.unwrap_or(SessionError::NoValidSession))
}

fn encrypt_state(
    state: &mut SessionState,
    plaintext: &[u8],
) -> Result<CiphertextMessage, SessionError> {
    let previous_counter = state.previous_counter();
    let chain = state.sending_chain_mut();
    let message_key = chain.next_message_key()?;
    let sender_ratchet_key = chain.ratchet_key_pair.public_key;
    let receiver_ratchet_key = chain.remote_ratchet_key;
    let counter = message_key.index();

    let associated_data = associated_data(
        state.version(),
        state.local_identity(),
        state.remote_identity(),
        &sender_ratchet_key,
        &receiver_ratchet_key,
        counter,
        previous_counter,
    );
    let ciphertext = seal(&message_key, &associated_data, plaintext)?;

    let message = RatchetMessage {
        ratchet_key: *sender_ratchet_key.as_bytes(),
        counter,
        previous_counter,
        ciphertext,
    };

    Ok(match state.pending_pre_key() {
        Some(pending) => CiphertextMessage::PreKey(PreKeyMessage {
            identity_key: *state.local_identity().as_bytes(),
            base_key: *pending.base_key.as_bytes(),
            signed_pre_key_id: pending.signed_pre_key_id,
            pre_key_id: pending.pre_key_id,
            message,
        }),
        None => CiphertextMessage::Ratchet(message),
    })
}

fn decrypt_state<E: Environment>(
    state: &mut SessionState,
    message: &RatchetMessage,
    env: &E,
    config: &SessionConfig,
) -> Result<Vec<u8>, SessionError> {
    let remote_ratchet_key = PublicKey::from_bytes(message.ratchet_key);

    if state.receiving_chain(&remote_ratchet_key).is_none() {
        let prior_key = state.sending_chain().remote_ratchet_key;
        if let Some(prior) = state.receiving_chain_mut(&prior_key) {
            prior.skip_to(message.previous_counter, config)?;
        }
        state.ratchet_step(remote_ratchet_key, env, config)?;
    }

    let chain = state.receiving_chain_mut(&remote_ratchet_key).ok_or(SessionError::NoValidSession)?;
    let local_ratchet_key = chain.local_ratchet_key;
    let message_key = chain.message_key(message.counter, config)?;

    let associated_data = associated_data(
        state.version(),
        state.remote_identity(),
        state.local_identity(),
        &remote_ratchet_key,
        &local_ratchet_key,
        message.counter,
        message.previous_counter,
    );
    let plaintext = open(&message_key, &associated_data, &message.ciphertext)?;

    state.clear_pending_pre_key();
    Ok(plaintext)
}

fn associated_data(
    version: u8,
    sender_identity: &IdentityKey,
    receiver_identity: &IdentityKey,
    sender_ratchet_key: &PublicKey,
    receiver_ratchet_key: &PublicKey,
    counter: u32,
    previous_counter: u32,
) -> Vec<u8> {
    let mut aad = Vec::with_capacity(1 + 4 * 32 + 8);
    aad.push(version);
    aad.extend_from_slice(sender_identity.as_bytes());
    aad.extend_from_slice(receiver_identity.as_bytes());
    aad.extend_from_slice(sender_ratchet_key.as_bytes());
    aad.extend_from_slice(receiver_ratchet_key.as_bytes());
    aad.extend_from_slice(&counter.to_be_bytes());
    aad.extend_from_slice(&previous_counter.to_be_bytes());
    aad
}

/// Encrypts and decrypts messages for one remote device through a store.
///
/// Callers must serialize calls per remote device.
pub struct SessionCipher<'a, S, E> {
    store: &'a S,
    remote: ProtocolAddress,
    env: E,
    config: SessionConfig,
}

impl<'a, S, E> SessionCipher<'a, S, E>
where
    S: ProtocolStore,
    E: Environment,
{
    /// Cipher for `remote` with default limits.
    pub fn new(store: &'a S, remote: ProtocolAddress, env: E) -> Self {
        Self { store, remote, env, config: SessionConfig::default() }
    }

    /// Cipher with explicit limits.
    pub fn with_config(
        store: &'a S,
        remote: ProtocolAddress,
        env: E,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self { store, remote, env, config })
    }

    /// Remote device this cipher talks to.
    pub fn remote(&self) -> &ProtocolAddress {
        &self.remote
    }

    /// Whether a current session exists for the remote device.
    pub fn has_session(&self) -> Result<bool, SessionError> {
        Ok(self.store.load_session(&self.remote)?.is_some_and(|r| r.has_current_state()))
    }

    /// Encrypt `plaintext` with the current session.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<CiphertextMessage, SessionError> {
        let mut record = self
            .store
            .load_session(&self.remote)?
            .filter(SessionRecord::has_current_state)
            .ok_or_else(|| SessionError::NoSession { address: self.remote.clone() })?;

        if let Some(state) = record.current() {
            self.check_trust(state.remote_identity())?;
        }

        let message = encrypt_record(&mut record, plaintext)?;
        self.store.store_session(&self.remote, &record)?;

        tracing::trace!(
            remote = %self.remote,
            counter = message.ratchet_message().counter,
            "encrypted"
        );
        Ok(message)
    }

    /// Decrypt a message from the remote device.
    pub fn decrypt(&self, message: &CiphertextMessage) -> Result<Vec<u8>, SessionError> {
        let result = match message {
            CiphertextMessage::Ratchet(message) => self.decrypt_ratchet(message),
            CiphertextMessage::PreKey(message) => self.decrypt_pre_key(message),
        };

        if let Err(err) = &result {
            tracing::debug!(remote = %self.remote, error = %err, "rejected message");
        }
        result
    }

    /// Decode a wire envelope and decrypt it.
    pub fn decrypt_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, SessionError> {
        let message = CiphertextMessage::decode(bytes)?;
        self.decrypt(&message)
    }

    fn decrypt_ratchet(&self, message: &RatchetMessage) -> Result<Vec<u8>, SessionError> {
        let mut record = self
            .store
            .load_session(&self.remote)?
            .ok_or_else(|| SessionError::NoSession { address: self.remote.clone() })?;

        let plaintext = decrypt_record(&mut record, message, &self.env, &self.config)?;

        if let Some(state) = record.current() {
            self.check_trust(state.remote_identity())?;
        }

        self.store.store_session(&self.remote, &record)?;
        Ok(plaintext)
    }

    fn decrypt_pre_key(&self, message: &PreKeyMessage) -> Result<Vec<u8>, SessionError> {
        let mut record = self.store.load_session(&self.remote)?.unwrap_or_default();
        let base_key = PublicKey::from_bytes(message.base_key);

        if record.has_session_state(&base_key) {
            let plaintext = decrypt_record(&mut record, &message.message, &self.env, &self.config)?;
            if let Some(state) = record.current() {
                self.check_trust(state.remote_identity())?;
            }
            self.store.store_session(&self.remote, &record)?;
            return Ok(plaintext);
        }

        let identity = IdentityKey::from_bytes(&message.identity_key).map_err(|e| {
            SessionError::InvalidInitialMessage { reason: e.to_string() }
        })?;
        self.check_trust(&identity)?;

        let local_identity = self.store.identity_key_pair()?;
        let incoming =
            build_for_incoming(message, &local_identity, self.store, self.store, &self.env)?;

        record.promote_state(incoming.state, self.config.max_archived_states);
        let plaintext = decrypt_record(&mut record, &message.message, &self.env, &self.config)?;

        // Once the record is stored the message key is spent, so nothing
        // fallible may follow that would hide the plaintext from the caller.
        self.store.save_identity(&self.remote, &identity)?;
        self.store.store_session(&self.remote, &record)?;

        if let Some(pre_key_id) = incoming.consumed_pre_key_id
            && let Err(err) = self.store.remove_pre_key(pre_key_id)
        {
            tracing::warn!(
                remote = %self.remote,
                pre_key_id,
                error = %err,
                "consumed one-time pre-key not removed"
            );
        }

        tracing::info!(
            remote = %self.remote,
            pre_key_id = ?incoming.consumed_pre_key_id,
            "session established from initial message"
        );
        Ok(plaintext)
    }

    fn check_trust(&self, identity: &IdentityKey) -> Result<(), SessionError> {
        if self.store.is_trusted_identity(&self.remote, identity)? {
            Ok(())
        } else {
            tracing::warn!(remote = %self.remote, "untrusted identity");
            Err(SessionError::UntrustedIdentity { address: self.remote.clone() })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parley_crypto::IdentityKeyPair;

    use super::*;
    use crate::{
        builder::build_for_outgoing,
        bundle::{PreKeyBundle, PreKeyRecord, SignedPreKeyRecord},
        bundle::OneTimePreKey,
        env::testing::{CountingEnv, FailingEnv},
        store::{MemoryStore, SignedPreKeyStore, StoreError},
    };

    /// Delegates to a [`MemoryStore`] but cannot delete one-time pre-keys.
    struct StickyPreKeys(MemoryStore);

    impl IdentityKeyStore for StickyPreKeys {
        fn identity_key_pair(&self) -> Result<IdentityKeyPair, StoreError> {
            self.0.identity_key_pair()
        }

        fn is_trusted_identity(
            &self,
            address: &ProtocolAddress,
            identity: &IdentityKey,
        ) -> Result<bool, StoreError> {
            self.0.is_trusted_identity(address, identity)
        }

        fn save_identity(
            &self,
            address: &ProtocolAddress,
            identity: &IdentityKey,
        ) -> Result<bool, StoreError> {
            self.0.save_identity(address, identity)
        }

        fn identity(&self, address: &ProtocolAddress) -> Result<Option<IdentityKey>, StoreError> {
            self.0.identity(address)
        }
    }

    impl PreKeyStore for StickyPreKeys {
        fn load_pre_key(&self, id: u32) -> Result<Option<PreKeyRecord>, StoreError> {
            self.0.load_pre_key(id)
        }

        fn store_pre_key(&self, record: PreKeyRecord) -> Result<(), StoreError> {
            self.0.store_pre_key(record)
        }

        fn remove_pre_key(&self, _id: u32) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }
    }

    impl SignedPreKeyStore for StickyPreKeys {
        fn load_signed_pre_key(&self, id: u32) -> Result<Option<SignedPreKeyRecord>, StoreError> {
            self.0.load_signed_pre_key(id)
        }

        fn store_signed_pre_key(&self, record: SignedPreKeyRecord) -> Result<(), StoreError> {
            self.0.store_signed_pre_key(record)
        }
    }

    impl SessionStore for StickyPreKeys {
        fn load_session(
            &self,
            address: &ProtocolAddress,
        ) -> Result<Option<SessionRecord>, StoreError> {
            self.0.load_session(address)
        }

        fn store_session(
            &self,
            address: &ProtocolAddress,
            record: &SessionRecord,
        ) -> Result<(), StoreError> {
            self.0.store_session(address, record)
        }
    }

    struct Pair {
        env: CountingEnv,
        config: SessionConfig,
        alice: SessionRecord,
        bob: SessionRecord,
    }

    fn bob_bundle(
        env: &CountingEnv,
        store: &MemoryStore,
        identity: &IdentityKeyPair,
    ) -> PreKeyBundle {
        let signed =
            SignedPreKeyRecord::generate(env.random_u32().unwrap(), identity, env).unwrap();
        let one_time = PreKeyRecord::generate(env.random_u32().unwrap(), env).unwrap();
        let bundle = PreKeyBundle::from_records(identity.identity_key(), &signed, Some(&one_time));
        store.store_signed_pre_key(signed).unwrap();
        store.store_pre_key(one_time).unwrap();
        bundle
    }

    /// Alice sends one initial message, Bob builds his session from it.
    fn established() -> Pair {
        let env = CountingEnv::default();
        let config = SessionConfig::default();
        let alice_identity = IdentityKeyPair::from_seed([0xA0; 32]);
        let bob_identity = IdentityKeyPair::from_seed([0xB0; 32]);
        let bob_store = MemoryStore::new(bob_identity.clone());
        let bundle = bob_bundle(&env, &bob_store, &bob_identity);

        let mut alice =
            SessionRecord::new(build_for_outgoing(&bundle, &alice_identity, &env).unwrap());
        let CiphertextMessage::PreKey(initial) = encrypt_record(&mut alice, b"hello bob").unwrap()
        else {
            unreachable!("first message must be an initial message");
        };

        let incoming =
            build_for_incoming(&initial, &bob_identity, &bob_store, &bob_store, &env).unwrap();
        let mut bob = SessionRecord::new(incoming.state);
        assert_eq!(
            decrypt_record(&mut bob, &initial.message, &env, &config).unwrap(),
            b"hello bob"
        );

        Pair { env, config, alice, bob }
    }

    fn send(from: &mut SessionRecord, plaintext: &[u8]) -> RatchetMessage {
        encrypt_record(from, plaintext).unwrap().ratchet_message().clone()
    }

    #[test]
    fn conversation_with_ratchet_steps() {
        let mut pair = established();

        for round in 0u8..4 {
            let to_alice = send(&mut pair.bob, &[round; 10]);
            assert_eq!(
                decrypt_record(&mut pair.alice, &to_alice, &pair.env, &pair.config).unwrap(),
                vec![round; 10]
            );

            let to_bob = send(&mut pair.alice, &[round + 100; 3]);
            assert_eq!(
                decrypt_record(&mut pair.bob, &to_bob, &pair.env, &pair.config).unwrap(),
                vec![round + 100; 3]
            );
        }
    }

    #[test]
    fn initial_messages_repeat_until_reply() {
        let mut pair = established();

        assert!(matches!(
            encrypt_record(&mut pair.alice, b"again").unwrap(),
            CiphertextMessage::PreKey(_)
        ));

        let reply = send(&mut pair.bob, b"hi alice");
        decrypt_record(&mut pair.alice, &reply, &pair.env, &pair.config).unwrap();

        assert!(pair.alice.current().unwrap().pending_pre_key().is_none());
        assert!(matches!(
            encrypt_record(&mut pair.alice, b"now plain").unwrap(),
            CiphertextMessage::Ratchet(_)
        ));
    }

    #[test]
    fn counters_increase_by_one() {
        let mut pair = established();

        let first = send(&mut pair.bob, b"a");
        let second = send(&mut pair.bob, b"b");

        assert_eq!(second.counter, first.counter + 1);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_leaves_record_unchanged() {
        let mut pair = established();
        let mut message = send(&mut pair.bob, b"secret");
        message.ciphertext[0] ^= 0x01;
        let before = pair.alice.to_bytes().unwrap();

        let result = decrypt_record(&mut pair.alice, &message, &pair.env, &pair.config);

        assert_eq!(result, Err(SessionError::AuthenticationFailed));
        assert_eq!(pair.alice.to_bytes().unwrap(), before);
    }

    #[test]
    fn tampered_counter_fails_authentication() {
        let mut pair = established();
        let _skipped = send(&mut pair.alice, b"zero");
        let mut message = send(&mut pair.alice, b"one");
        message.previous_counter += 1;

        let result = decrypt_record(&mut pair.bob, &message, &pair.env, &pair.config);
        assert_eq!(result, Err(SessionError::AuthenticationFailed));
    }

    #[test]
    fn empty_record_has_no_valid_session() {
        let pair = established();
        let message = {
            let mut alice = pair.alice.clone();
            send(&mut alice, b"x")
        };
        let mut empty = SessionRecord::default();

        assert_eq!(
            decrypt_record(&mut empty, &message, &pair.env, &pair.config),
            Err(SessionError::NoValidSession)
        );
        assert_eq!(encrypt_record(&mut empty, b"x").unwrap_err(), SessionError::NoValidSession);
    }

    #[test]
    fn archived_state_decrypts_and_is_promoted() {
        let mut pair = established();
        let reply_on_old = send(&mut pair.bob, b"late reply");

        // Alice starts a second session with a fresh bundle, archiving the first.
        let bob_identity = IdentityKeyPair::from_seed([0xB0; 32]);
        let bob_store = MemoryStore::new(bob_identity.clone());
        let bundle = bob_bundle(&pair.env, &bob_store, &bob_identity);
        let alice_identity = IdentityKeyPair::from_seed([0xA0; 32]);
        let fresh = build_for_outgoing(&bundle, &alice_identity, &pair.env).unwrap();
        let fresh_base = *fresh.base_key();
        pair.alice.promote_state(fresh, pair.config.max_archived_states);
        assert_eq!(pair.alice.archived_count(), 1);

        let plaintext =
            decrypt_record(&mut pair.alice, &reply_on_old, &pair.env, &pair.config).unwrap();

        assert_eq!(plaintext, b"late reply");
        assert_ne!(pair.alice.current().unwrap().base_key(), &fresh_base);
        assert_eq!(pair.alice.previous_states().next().unwrap().base_key(), &fresh_base);
    }

    #[test]
    fn archive_is_bounded() {
        let pair = established();
        let mut record = pair.alice.clone();
        let state = pair.alice.current().unwrap().clone();

        for _ in 0..10 {
            record.promote_state(state.clone(), 3);
        }

        assert_eq!(record.archived_count(), 3);
    }

    #[test]
    fn record_survives_serialization() {
        let mut pair = established();
        let message = send(&mut pair.bob, b"persisted");

        let mut restored = SessionRecord::from_bytes(&pair.alice.to_bytes().unwrap()).unwrap();

        assert_eq!(
            decrypt_record(&mut restored, &message, &pair.env, &pair.config).unwrap(),
            b"persisted"
        );
    }

    #[test]
    fn cipher_without_session_reports_no_session() {
        let store = MemoryStore::new(IdentityKeyPair::from_seed([1u8; 32]));
        let cipher =
            SessionCipher::new(&store, ProtocolAddress::new("bob", 1), CountingEnv::default());

        assert!(!cipher.has_session().unwrap());
        assert!(matches!(cipher.encrypt(b"x"), Err(SessionError::NoSession { .. })));
    }

    #[test]
    fn cipher_rejects_invalid_config() {
        let store = MemoryStore::new(IdentityKeyPair::from_seed([1u8; 32]));
        let config = SessionConfig { max_receiver_chains: 0, ..SessionConfig::default() };

        let result = SessionCipher::with_config(
            &store,
            ProtocolAddress::new("bob", 1),
            CountingEnv::default(),
            config,
        );
        assert!(matches!(result, Err(SessionError::InvalidConfig { .. })));
    }

    #[test]
    fn failed_pre_key_removal_still_delivers_initial_message() {
        let env = CountingEnv::default();
        let alice_identity = IdentityKeyPair::from_seed([0xA0; 32]);
        let bob_identity = IdentityKeyPair::from_seed([0xB0; 32]);
        let bob_store = StickyPreKeys(MemoryStore::new(bob_identity.clone()));
        let bundle = bob_bundle(&env, &bob_store.0, &bob_identity);
        let OneTimePreKey { id: pre_key_id, .. } = bundle.one_time_pre_key.unwrap();

        let mut alice =
            SessionRecord::new(build_for_outgoing(&bundle, &alice_identity, &env).unwrap());
        let initial = encrypt_record(&mut alice, b"hello bob").unwrap();

        let cipher = SessionCipher::new(&bob_store, ProtocolAddress::new("alice", 1), env);

        assert_eq!(cipher.decrypt(&initial).unwrap(), b"hello bob");
        assert!(cipher.has_session().unwrap());
        assert!(bob_store.0.load_pre_key(pre_key_id).unwrap().is_some());
        assert_eq!(cipher.decrypt(&initial), Err(SessionError::DuplicateMessage { counter: 0 }));
    }

    #[test]
    fn encrypt_rechecks_trust() {
        let pair = established();
        let store = MemoryStore::new(IdentityKeyPair::from_seed([0xA0; 32]));
        let bob = ProtocolAddress::new("bob", 1);
        store.store_session(&bob, &pair.alice).unwrap();
        let impostor = IdentityKeyPair::from_seed([0xEE; 32]).identity_key();
        store.save_identity(&bob, &impostor).unwrap();
        let before = pair.alice.to_bytes().unwrap();

        let cipher = SessionCipher::new(&store, bob.clone(), pair.env.clone());

        assert_eq!(
            cipher.encrypt(b"x"),
            Err(SessionError::UntrustedIdentity { address: bob.clone() })
        );
        assert_eq!(store.load_session(&bob).unwrap().unwrap().to_bytes().unwrap(), before);
    }

    #[test]
    fn repeated_initial_message_rechecks_trust() {
        let env = CountingEnv::default();
        let alice_identity = IdentityKeyPair::from_seed([0xA0; 32]);
        let bob_identity = IdentityKeyPair::from_seed([0xB0; 32]);
        let bob_store = MemoryStore::new(bob_identity.clone());
        let bundle = bob_bundle(&env, &bob_store, &bob_identity);

        let mut alice =
            SessionRecord::new(build_for_outgoing(&bundle, &alice_identity, &env).unwrap());
        let first = encrypt_record(&mut alice, b"one").unwrap();
        let second = encrypt_record(&mut alice, b"two").unwrap();
        assert!(matches!(second, CiphertextMessage::PreKey(_)));

        let alice_address = ProtocolAddress::new("alice", 1);
        let cipher = SessionCipher::new(&bob_store, alice_address.clone(), env);
        assert_eq!(cipher.decrypt(&first).unwrap(), b"one");

        let impostor = IdentityKeyPair::from_seed([0xEE; 32]).identity_key();
        bob_store.save_identity(&alice_address, &impostor).unwrap();
        let before = bob_store.load_session(&alice_address).unwrap().unwrap().to_bytes().unwrap();

        assert_eq!(
            cipher.decrypt(&second),
            Err(SessionError::UntrustedIdentity { address: alice_address.clone() })
        );
        assert_eq!(
            bob_store.load_session(&alice_address).unwrap().unwrap().to_bytes().unwrap(),
            before
        );
    }

    #[test]
    fn entropy_failure_during_ratchet_step_writes_nothing() {
        let mut pair = established();
        let reply = send(&mut pair.bob, b"needs a ratchet step");
        let store = MemoryStore::new(IdentityKeyPair::from_seed([0xA0; 32]));
        let bob = ProtocolAddress::new("bob", 1);
        store.store_session(&bob, &pair.alice).unwrap();
        let before = pair.alice.to_bytes().unwrap();

        let cipher = SessionCipher::new(&store, bob.clone(), FailingEnv);
        let result = cipher.decrypt(&CiphertextMessage::Ratchet(reply));

        assert!(matches!(
            result,
            Err(SessionError::CryptoPrimitiveFailure(parley_crypto::CryptoError::Entropy(_)))
        ));
        assert!(result.unwrap_err().is_fatal());
        assert_eq!(store.load_session(&bob).unwrap().unwrap().to_bytes().unwrap(), before);
    }
}

//! Session establishment.
//!
//! The initiator (Alice) consumes Bob's pre-key bundle; the responder (Bob)
//! consumes Alice's initial message. Both derive the same root key from the
//! same set of agreements:
//!
//! ```text
//! DH1 = DH(IK_A, SPK_B)
//! DH2 = DH(EK_A, IK_B)
//! DH3 = DH(EK_A, SPK_B)
//! DH4 = DH(EK_A, OPK_B)      only with a one-time pre-key
//!
//! RK_0, CK_0 = KDF(0xFF*32 ‖ DH1 ‖ DH2 ‖ DH3 [‖ DH4])
//! ```
//!
//! Alice's ephemeral EK_A doubles as her first ratchet key and Bob's signed
//! pre-key as his. Bob ratchets once immediately so his first reply already
//! carries a fresh ratchet key.
//!
//! Building never touches an existing session; [`SessionBuilder`] is the
//! store-facing wrapper that persists the result.

use parley_crypto::{
    IdentityKey, IdentityKeyPair, KEY_LENGTH, PrivateKey, PublicKey, derive_initial_secrets,
    ratchet_root,
};
use parley_proto::PreKeyMessage;
use zeroize::Zeroizing;

use crate::{
    address::ProtocolAddress,
    bundle::PreKeyBundle,
    config::SessionConfig,
    env::Environment,
    error::SessionError,
    state::{PendingPreKey, ReceivingChain, SendingChain, SessionState},
    store::{IdentityKeyStore, PreKeyStore, ProtocolStore, SessionStore, SignedPreKeyStore},
};

/// Result of building a session from an initial message.
#[derive(Debug)]
pub struct IncomingSession {
    /// The new session state.
    pub state: SessionState,
    /// One-time pre-key the session consumed. The caller deletes it from
    /// the store once the session is persisted.
    pub consumed_pre_key_id: Option<u32>,
}

/// Build the initiator's session from a remote pre-key bundle.
pub fn build_for_outgoing<E: Environment>(
    bundle: &PreKeyBundle,
    local_identity: &IdentityKeyPair,
    env: &E,
) -> Result<SessionState, SessionError> {
    bundle.verify_signature()?;

    let base = env.generate_key_pair()?;

    let mut agreements = Zeroizing::new(Vec::with_capacity(4 * KEY_LENGTH));
    agreements.extend_from_slice(&local_identity.agreement_key().agree(&bundle.signed_pre_key)?);
    agreements.extend_from_slice(&base.private_key.agree(&bundle.identity_key.agreement_key())?);
    agreements.extend_from_slice(&base.private_key.agree(&bundle.signed_pre_key)?);
    if let Some(one_time) = &bundle.one_time_pre_key {
        agreements.extend_from_slice(&base.private_key.agree(&one_time.public_key)?);
    }

    let (root_key, chain_key) = derive_initial_secrets(&agreements)?;

    let pending = PendingPreKey {
        pre_key_id: bundle.one_time_pre_key.map(|k| k.id),
        signed_pre_key_id: bundle.signed_pre_key_id,
        base_key: base.public_key,
    };
    let sending_chain = SendingChain::new(base, bundle.signed_pre_key, chain_key);

    tracing::debug!(
        signed_pre_key_id = pending.signed_pre_key_id,
        pre_key_id = ?pending.pre_key_id,
        "built outgoing session"
    );

    Ok(SessionState::initiator(
        local_identity.identity_key(),
        bundle.identity_key,
        root_key,
        sending_chain,
        pending,
    ))
}

/// Build the responder's session from an initial message.
///
/// Nothing is removed from the stores here: the consumed one-time pre-key is
/// reported in [`IncomingSession::consumed_pre_key_id`] so the caller can
/// delete it after the session is safely persisted.
pub fn build_for_incoming<P, S, E>(
    message: &PreKeyMessage,
    local_identity: &IdentityKeyPair,
    pre_keys: &P,
    signed_pre_keys: &S,
    env: &E,
) -> Result<IncomingSession, SessionError>
where
    P: PreKeyStore + ?Sized,
    S: SignedPreKeyStore + ?Sized,
    E: Environment,
{
    let remote_identity =
        IdentityKey::from_bytes(&message.identity_key).map_err(|e| invalid_initial(&e))?;
    let base_key = PublicKey::from_bytes(message.base_key);

    if message.message.ratchet_key != message.base_key {
        return Err(SessionError::InvalidInitialMessage {
            reason: "first ratchet key differs from base key".to_string(),
        });
    }

    let signed_pre_key = signed_pre_keys
        .load_signed_pre_key(message.signed_pre_key_id)?
        .ok_or(SessionError::UnknownSignedPreKey { signed_pre_key_id: message.signed_pre_key_id })?;

    let one_time_pre_key = match message.pre_key_id {
        Some(pre_key_id) => Some(
            pre_keys
                .load_pre_key(pre_key_id)?
                .ok_or(SessionError::UnknownPreKeyIdentifier { pre_key_id })?,
        ),
        None => None,
    };

    let signed = &signed_pre_key.key_pair;
    let remote_agreement_key = remote_identity.agreement_key();
    let mut agreements = Zeroizing::new(Vec::with_capacity(4 * KEY_LENGTH));
    agreements.extend_from_slice(&agree_initial(&signed.private_key, &remote_agreement_key)?);
    agreements.extend_from_slice(&agree_initial(&local_identity.agreement_key(), &base_key)?);
    agreements.extend_from_slice(&agree_initial(&signed.private_key, &base_key)?);
    if let Some(one_time) = &one_time_pre_key {
        agreements.extend_from_slice(&agree_initial(&one_time.key_pair.private_key, &base_key)?);
    }

    let (initial_root, receiving_key) = derive_initial_secrets(&agreements)?;
    let receiving_chain = ReceivingChain::new(base_key, signed.public_key, receiving_key);

    let ratchet = env.generate_key_pair()?;
    let ratchet_secret = agree_initial(&ratchet.private_key, &base_key)?;
    let (root_key, sending_key) = ratchet_root(&initial_root, &ratchet_secret)?;
    let sending_chain = SendingChain::new(ratchet, base_key, sending_key);

    tracing::debug!(
        signed_pre_key_id = message.signed_pre_key_id,
        pre_key_id = ?message.pre_key_id,
        "built incoming session"
    );

    Ok(IncomingSession {
        state: SessionState::responder(
            local_identity.identity_key(),
            remote_identity,
            base_key,
            root_key,
            receiving_chain,
            sending_chain,
        ),
        consumed_pre_key_id: one_time_pre_key.map(|k| k.id),
    })
}

fn agree_initial(
    private: &PrivateKey,
    public: &PublicKey,
) -> Result<[u8; KEY_LENGTH], SessionError> {
    private.agree(public).map_err(|e| invalid_initial(&e))
}

fn invalid_initial(err: &impl std::fmt::Display) -> SessionError {
    SessionError::InvalidInitialMessage { reason: err.to_string() }
}

/// Establishes sessions with one remote device through a store.
pub struct SessionBuilder<'a, S, E> {
    store: &'a S,
    remote: ProtocolAddress,
    env: E,
    config: SessionConfig,
}

impl<'a, S, E> SessionBuilder<'a, S, E>
where
    S: ProtocolStore,
    E: Environment,
{
    /// Builder for `remote` with default limits.
    pub fn new(store: &'a S, remote: ProtocolAddress, env: E) -> Self {
        Self { store, remote, env, config: SessionConfig::default() }
    }

    /// Builder with explicit limits.
    pub fn with_config(
        store: &'a S,
        remote: ProtocolAddress,
        env: E,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self { store, remote, env, config })
    }

    /// Start a session from the remote device's pre-key bundle.
    ///
    /// On success the new state is current in the device's record and the
    /// remote identity is saved. Verification and trust failures persist
    /// nothing; the identity is saved before the record, so a failed record
    /// write can leave only an already trusted identity behind.
    pub fn process_pre_key_bundle(&self, bundle: &PreKeyBundle) -> Result<(), SessionError> {
        bundle.verify_signature()?;

        if !self.store.is_trusted_identity(&self.remote, &bundle.identity_key)? {
            tracing::warn!(remote = %self.remote, "untrusted identity in pre-key bundle");
            return Err(SessionError::UntrustedIdentity { address: self.remote.clone() });
        }

        let local_identity = self.store.identity_key_pair()?;
        let state = build_for_outgoing(bundle, &local_identity, &self.env)?;

        let mut record = self.store.load_session(&self.remote)?.unwrap_or_default();
        record.promote_state(state, self.config.max_archived_states);

        self.store.save_identity(&self.remote, &bundle.identity_key)?;
        self.store.store_session(&self.remote, &record)?;

        tracing::info!(
            remote = %self.remote,
            archived = record.archived_count(),
            "session established"
        );
        Ok(())
    }
}

//! Cryptographic state of one session with one remote device.

use std::collections::VecDeque;

use parley_crypto::{IdentityKey, PublicKey, RootKey, ratchet_root};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::chain::{ReceivingChain, SendingChain};
use crate::{config::SessionConfig, env::Environment, error::SessionError};

/// Which side started the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SessionOrigin {
    /// Built locally from a remote pre-key bundle.
    Initiator = 1,
    /// Built from a remote initial message.
    Responder = 2,
}

/// Initial-message fields the initiator repeats on every outgoing message
/// until the responder's first reply arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPreKey {
    /// One-time pre-key that was used, if any.
    pub pre_key_id: Option<u32>,
    /// Signed pre-key that was used.
    pub signed_pre_key_id: u32,
    /// Initiator's base (ephemeral) public key.
    pub base_key: PublicKey,
}

/// Mutable ratchet state for one session.
///
/// # Invariants
///
/// - `root_key` is replaced on every Diffie-Hellman ratchet step
/// - `receiving_chains` holds at most `max_receiver_chains`, newest last
/// - `base_key` never changes and identifies the session across the record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    version: u8,
    origin: SessionOrigin,
    local_identity: IdentityKey,
    remote_identity: IdentityKey,
    base_key: PublicKey,
    root_key: RootKey,
    sending_chain: SendingChain,
    receiving_chains: VecDeque<ReceivingChain>,
    previous_counter: u32,
    pending_pre_key: Option<PendingPreKey>,
}

impl SessionState {
    /// State for the side that consumed a pre-key bundle.
    pub(crate) fn initiator(
        local_identity: IdentityKey,
        remote_identity: IdentityKey,
        root_key: RootKey,
        sending_chain: SendingChain,
        pending: PendingPreKey,
    ) -> Self {
        Self {
            version: parley_proto::CURRENT_VERSION,
            origin: SessionOrigin::Initiator,
            local_identity,
            remote_identity,
            base_key: pending.base_key,
            root_key,
            sending_chain,
            receiving_chains: VecDeque::new(),
            previous_counter: 0,
            pending_pre_key: Some(pending),
        }
    }

    /// State for the side that received an initial message.
    pub(crate) fn responder(
        local_identity: IdentityKey,
        remote_identity: IdentityKey,
        base_key: PublicKey,
        root_key: RootKey,
        receiving_chain: ReceivingChain,
        sending_chain: SendingChain,
    ) -> Self {
        Self {
            version: parley_proto::CURRENT_VERSION,
            origin: SessionOrigin::Responder,
            local_identity,
            remote_identity,
            base_key,
            root_key,
            sending_chain,
            receiving_chains: VecDeque::from([receiving_chain]),
            previous_counter: 0,
            pending_pre_key: None,
        }
    }

    /// Wire version this session speaks.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Which side started the session.
    pub fn origin(&self) -> SessionOrigin {
        self.origin
    }

    /// Local identity key.
    pub fn local_identity(&self) -> &IdentityKey {
        &self.local_identity
    }

    /// Remote identity key.
    pub fn remote_identity(&self) -> &IdentityKey {
        &self.remote_identity
    }

    /// Initiator's base key.
    pub fn base_key(&self) -> &PublicKey {
        &self.base_key
    }

    /// Current sending chain.
    pub fn sending_chain(&self) -> &SendingChain {
        &self.sending_chain
    }

    pub(crate) fn sending_chain_mut(&mut self) -> &mut SendingChain {
        &mut self.sending_chain
    }

    /// Receiving chains, oldest first.
    pub fn receiving_chains(&self) -> impl Iterator<Item = &ReceivingChain> {
        self.receiving_chains.iter()
    }

    /// Receiving chain for a remote ratchet key.
    pub fn receiving_chain(&self, remote_ratchet_key: &PublicKey) -> Option<&ReceivingChain> {
        self.receiving_chains.iter().find(|c| &c.remote_ratchet_key == remote_ratchet_key)
    }

    pub(crate) fn receiving_chain_mut(
        &mut self,
        remote_ratchet_key: &PublicKey,
    ) -> Option<&mut ReceivingChain> {
        self.receiving_chains.iter_mut().find(|c| &c.remote_ratchet_key == remote_ratchet_key)
    }

    /// Length of the previous sending chain.
    pub fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    /// Pending initial-message fields, if the remote side has not replied yet.
    pub fn pending_pre_key(&self) -> Option<&PendingPreKey> {
        self.pending_pre_key.as_ref()
    }

    pub(crate) fn clear_pending_pre_key(&mut self) {
        self.pending_pre_key = None;
    }

    /// Diffie-Hellman ratchet step on a new remote ratchet key.
    ///
    /// Derives a receiving chain from the current local ratchet key, then a
    /// fresh local ratchet key and sending chain. The previous sending
    /// chain's length becomes `previous_counter`.
    pub(crate) fn ratchet_step<E: Environment>(
        &mut self,
        remote_ratchet_key: PublicKey,
        env: &E,
        config: &SessionConfig,
    ) -> Result<(), SessionError> {
        let local = &self.sending_chain.ratchet_key_pair;
        let receiving_secret = local.private_key.agree(&remote_ratchet_key)?;
        let (intermediate_root, receiving_key) = ratchet_root(&self.root_key, &receiving_secret)?;
        let receiving = ReceivingChain::new(remote_ratchet_key, local.public_key, receiving_key);

        let new_pair = env.generate_key_pair()?;
        let sending_secret = new_pair.private_key.agree(&remote_ratchet_key)?;
        let (root_key, sending_key) = ratchet_root(&intermediate_root, &sending_secret)?;

        self.receiving_chains.push_back(receiving);
        while self.receiving_chains.len() > config.max_receiver_chains {
            self.receiving_chains.pop_front();
        }

        self.previous_counter = self.sending_chain.index();
        self.sending_chain = SendingChain::new(new_pair, remote_ratchet_key, sending_key);
        self.root_key = root_key;

        tracing::debug!(
            previous_counter = self.previous_counter,
            receiving_chains = self.receiving_chains.len(),
            "ratchet step"
        );
        Ok(())
    }
}

//! Sending and receiving chains.

use std::collections::BTreeMap;

use parley_crypto::{ChainKey, CryptoError, KeyPair, MessageKey, PublicKey, advance_chain};
use serde::{Deserialize, Serialize};

use crate::{config::SessionConfig, error::SessionError};

/// Chain used for outgoing messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendingChain {
    /// Local ratchet key pair advertised in every outgoing message.
    pub ratchet_key_pair: KeyPair,
    /// Remote ratchet key this chain was derived against.
    pub remote_ratchet_key: PublicKey,
    chain_key: ChainKey,
}

impl SendingChain {
    /// Fresh sending chain.
    pub fn new(
        ratchet_key_pair: KeyPair,
        remote_ratchet_key: PublicKey,
        chain_key: ChainKey,
    ) -> Self {
        Self { ratchet_key_pair, remote_ratchet_key, chain_key }
    }

    /// Index the next outgoing message will use.
    pub fn index(&self) -> u32 {
        self.chain_key.index()
    }

    /// Step the chain and return the key for the current index.
    pub fn next_message_key(&mut self) -> Result<MessageKey, CryptoError> {
        let (next, message_key) = advance_chain(&self.chain_key)?;
        self.chain_key = next;
        Ok(message_key)
    }
}

/// Chain for messages from one remote ratchet key.
///
/// Message keys derived ahead of the next expected index are buffered in
/// `skipped` until used. The buffer never exceeds
/// [`SessionConfig::max_message_keys`]; the lowest index is evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivingChain {
    /// Remote ratchet key that produced this chain.
    pub remote_ratchet_key: PublicKey,
    /// Local ratchet key that was current when the chain was derived.
    pub local_ratchet_key: PublicKey,
    chain_key: ChainKey,
    skipped: BTreeMap<u32, MessageKey>,
}

impl ReceivingChain {
    /// Fresh receiving chain with no skipped keys.
    pub fn new(
        remote_ratchet_key: PublicKey,
        local_ratchet_key: PublicKey,
        chain_key: ChainKey,
    ) -> Self {
        Self { remote_ratchet_key, local_ratchet_key, chain_key, skipped: BTreeMap::new() }
    }

    /// Next expected index.
    pub fn index(&self) -> u32 {
        self.chain_key.index()
    }

    /// Number of buffered skipped keys.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Whether a skipped key is buffered for `counter`.
    pub fn has_skipped(&self, counter: u32) -> bool {
        self.skipped.contains_key(&counter)
    }

    /// Resolve the message key for `counter`.
    ///
    /// - behind the chain: take the buffered key, or `DuplicateMessage`
    /// - at the chain: advance once
    /// - ahead of the chain: buffer every key in between, then advance
    pub fn message_key(
        &mut self,
        counter: u32,
        config: &SessionConfig,
    ) -> Result<MessageKey, SessionError> {
        if counter < self.index() {
            return self.skipped.remove(&counter).ok_or(SessionError::DuplicateMessage { counter });
        }

        self.skip_to(counter, config)?;
        let (next, message_key) = advance_chain(&self.chain_key)?;
        self.chain_key = next;
        Ok(message_key)
    }

    /// Buffer keys for every index below `target`.
    ///
    /// Checks the skip limit before deriving anything. A target at or behind
    /// the chain is a no-op.
    pub fn skip_to(&mut self, target: u32, config: &SessionConfig) -> Result<(), SessionError> {
        let current = self.index();
        if target <= current {
            return Ok(());
        }
        if target - current > config.max_skip {
            return Err(SessionError::TooManySkippedMessages {
                current,
                requested: target,
                max_skip: config.max_skip,
            });
        }

        while self.index() < target {
            let (next, message_key) = advance_chain(&self.chain_key)?;
            self.skipped.insert(message_key.index(), message_key);
            self.chain_key = next;

            if self.skipped.len() > config.max_message_keys {
                self.skipped.pop_first();
            }
        }

        tracing::trace!(
            from = current,
            to = target,
            buffered = self.skipped.len(),
            "skipped message keys"
        );
        Ok(())
    }
}

//! Pre-key bundles and the local pre-key records behind them.

use std::fmt;

use parley_crypto::{IdentityKey, IdentityKeyPair, KeyPair, PublicKey, SIGNATURE_LENGTH};

use crate::{env::Environment, error::SessionError};

/// Public one-time pre-key published in a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneTimePreKey {
    /// Identifier the responder files the private half under.
    pub id: u32,
    /// Public half.
    pub public_key: PublicKey,
}

/// Everything an initiator needs to start a session without the responder
/// being online.
#[derive(Clone, PartialEq, Eq)]
pub struct PreKeyBundle {
    /// Responder's identity key.
    pub identity_key: IdentityKey,
    /// Identifier of the signed pre-key.
    pub signed_pre_key_id: u32,
    /// Medium-term signed pre-key.
    pub signed_pre_key: PublicKey,
    /// Identity signature over the signed pre-key bytes.
    pub signed_pre_key_signature: [u8; SIGNATURE_LENGTH],
    /// Optional one-time pre-key.
    pub one_time_pre_key: Option<OneTimePreKey>,
}

impl PreKeyBundle {
    /// Verify the signed pre-key against the bundle identity.
    pub fn verify_signature(&self) -> Result<(), SessionError> {
        self.identity_key
            .verify(self.signed_pre_key.as_bytes(), &self.signed_pre_key_signature)
            .map_err(|_| SessionError::InvalidSignature)
    }
}

impl fmt::Debug for PreKeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreKeyBundle")
            .field("identity_key", &self.identity_key)
            .field("signed_pre_key_id", &self.signed_pre_key_id)
            .field("signed_pre_key", &self.signed_pre_key)
            .field("one_time_pre_key", &self.one_time_pre_key)
            .finish_non_exhaustive()
    }
}

/// Local one-time pre-key. Deleted once a session consumes it.
#[derive(Debug, Clone)]
pub struct PreKeyRecord {
    /// Published identifier.
    pub id: u32,
    /// Key pair.
    pub key_pair: KeyPair,
}

impl PreKeyRecord {
    /// Generate a fresh one-time pre-key.
    pub fn generate<E: Environment>(id: u32, env: &E) -> Result<Self, SessionError> {
        Ok(Self { id, key_pair: env.generate_key_pair()? })
    }

    /// Public form for a bundle.
    pub fn public(&self) -> OneTimePreKey {
        OneTimePreKey { id: self.id, public_key: self.key_pair.public_key }
    }
}

/// Local signed pre-key.
#[derive(Debug, Clone)]
pub struct SignedPreKeyRecord {
    /// Published identifier.
    pub id: u32,
    /// Key pair.
    pub key_pair: KeyPair,
    /// Identity signature over the public key bytes.
    pub signature: [u8; SIGNATURE_LENGTH],
}

impl SignedPreKeyRecord {
    /// Generate a fresh signed pre-key and sign it with `identity`.
    pub fn generate<E: Environment>(
        id: u32,
        identity: &IdentityKeyPair,
        env: &E,
    ) -> Result<Self, SessionError> {
        let key_pair = env.generate_key_pair()?;
        let signature = identity.sign(key_pair.public_key.as_bytes());
        Ok(Self { id, key_pair, signature })
    }
}

impl PreKeyBundle {
    /// Assemble a bundle from local records.
    pub fn from_records(
        identity_key: IdentityKey,
        signed_pre_key: &SignedPreKeyRecord,
        one_time_pre_key: Option<&PreKeyRecord>,
    ) -> Self {
        Self {
            identity_key,
            signed_pre_key_id: signed_pre_key.id,
            signed_pre_key: signed_pre_key.key_pair.public_key,
            signed_pre_key_signature: signed_pre_key.signature,
            one_time_pre_key: one_time_pre_key.map(PreKeyRecord::public),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::env::SystemEnv;

    #[test]
    fn generated_bundle_verifies() {
        let env = SystemEnv::new();
        let identity = IdentityKeyPair::from_seed([1u8; 32]);
        let signed = SignedPreKeyRecord::generate(1, &identity, &env).unwrap();
        let one_time = PreKeyRecord::generate(5, &env).unwrap();

        let bundle = PreKeyBundle::from_records(identity.identity_key(), &signed, Some(&one_time));

        assert!(bundle.verify_signature().is_ok());
        assert_eq!(bundle.one_time_pre_key.unwrap().id, 5);
    }

    #[test]
    fn bundle_signed_by_other_identity_fails() {
        let env = SystemEnv::new();
        let identity = IdentityKeyPair::from_seed([1u8; 32]);
        let impostor = IdentityKeyPair::from_seed([2u8; 32]);
        let signed = SignedPreKeyRecord::generate(1, &impostor, &env).unwrap();

        let bundle = PreKeyBundle::from_records(identity.identity_key(), &signed, None);

        assert_eq!(bundle.verify_signature(), Err(SessionError::InvalidSignature));
    }
}

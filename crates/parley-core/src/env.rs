//! Environment abstraction for deterministic testing.
//!
//! The protocol never reaches for randomness on its own. Every key pair is
//! generated from bytes drawn through [`Environment`], so the simulation
//! harness can replay a conversation exactly from a seed while production
//! code uses OS entropy.
//!
//! # Invariants
//!
//! - Determinism: given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: implementations must not share global state

use parley_crypto::{CryptoError, KEY_LENGTH, KeyPair};

/// Source of randomness for the protocol.
///
/// # Security
///
/// Production implementations MUST draw from a cryptographically secure
/// source (see [`SystemEnv`]). Failure to obtain entropy is reported, never
/// papered over with fixed bytes.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError>;

    /// Draws a 32-byte key seed.
    fn random_seed(&self) -> Result<[u8; KEY_LENGTH], CryptoError> {
        let mut seed = [0u8; KEY_LENGTH];
        self.random_bytes(&mut seed)?;
        Ok(seed)
    }

    /// Generates a random `u32`, e.g. for pre-key identifiers.
    fn random_u32(&self) -> Result<u32, CryptoError> {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Generates a fresh X25519 key pair.
    fn generate_key_pair(&self) -> Result<KeyPair, CryptoError> {
        Ok(KeyPair::from_seed(self.random_seed()?))
    }
}

/// Production environment backed by `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(buffer).map_err(|e| {
            tracing::error!(error = %e, "getrandom failed");
            CryptoError::Entropy(e.to_string())
        })
    }
}


#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::*;

    /// Deterministic environment for unit tests. Clones share the counter.
    #[derive(Clone, Default)]
    pub(crate) struct CountingEnv(Arc<AtomicU64>);

    impl Environment for CountingEnv {
        #[allow(clippy::cast_possible_truncation)]
        fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
            let n = self.0.fetch_add(1, Ordering::Relaxed) + 1;
            for (i, byte) in buffer.iter_mut().enumerate() {
                let mixed = n.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left((i % 64) as u32)
                    ^ (i as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
                *byte = (mixed >> 24) as u8;
            }
            Ok(())
        }
    }

    /// Environment whose entropy source is always unavailable.
    #[derive(Clone, Copy, Default)]
    pub(crate) struct FailingEnv;

    impl Environment for FailingEnv {
        fn random_bytes(&self, _buffer: &mut [u8]) -> Result<(), CryptoError> {
            Err(CryptoError::Entropy("entropy source unavailable".to_string()))
        }
    }
}

//! Seeded environment for simulation.

use std::sync::{Arc, Mutex};

use parley_core::Environment;
use parley_crypto::CryptoError;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Deterministic environment backed by a seeded ChaCha20 RNG.
///
/// Clones share the RNG, so every party in one simulation draws from a
/// single reproducible stream.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    seed: u64,
}

impl SimEnv {
    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        tracing::debug!(seed, "simulation environment");
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))), seed }
    }

    /// Seed this environment was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Environment for SimEnv {
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        let mut rng =
            self.rng.lock().map_err(|_| CryptoError::Entropy("rng lock poisoned".to_string()))?;
        rng.fill_bytes(buffer);
        Ok(())
    }
}

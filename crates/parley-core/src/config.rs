//! Session resource limits.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Bounds on the memory a single session may hold.
///
/// Every limit caps something an adversary could otherwise grow without
/// bound: skipped keys by sending far-ahead counters, receiving chains by
/// rotating ratchet keys, archived states by renegotiating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest forward jump within one receiving chain.
    pub max_skip: u32,
    /// Skipped message keys retained per receiving chain. Oldest evicted.
    pub max_message_keys: usize,
    /// Receiving chains retained per session state. Oldest evicted.
    pub max_receiver_chains: usize,
    /// Superseded session states retained per record. Oldest evicted.
    pub max_archived_states: usize,
}

impl SessionConfig {
    /// Default maximum forward jump.
    pub const DEFAULT_MAX_SKIP: u32 = 2000;
    /// Default skipped-key capacity per chain.
    pub const DEFAULT_MAX_MESSAGE_KEYS: usize = 2000;
    /// Default receiving chains per state.
    pub const DEFAULT_MAX_RECEIVER_CHAINS: usize = 5;
    /// Default archived states per record.
    pub const DEFAULT_MAX_ARCHIVED_STATES: usize = 5;

    /// Check that the limits are usable together.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_receiver_chains == 0 {
            return Err(SessionError::InvalidConfig {
                reason: "max_receiver_chains must be at least 1".to_string(),
            });
        }
        if self.max_message_keys < self.max_skip as usize {
            return Err(SessionError::InvalidConfig {
                reason: format!(
                    "max_message_keys ({}) must be >= max_skip ({})",
                    self.max_message_keys, self.max_skip
                ),
            });
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_skip: Self::DEFAULT_MAX_SKIP,
            max_message_keys: Self::DEFAULT_MAX_MESSAGE_KEYS,
            max_receiver_chains: Self::DEFAULT_MAX_RECEIVER_CHAINS,
            max_archived_states: Self::DEFAULT_MAX_ARCHIVED_STATES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_receiver_chains_rejected() {
        let config = SessionConfig { max_receiver_chains: 0, ..SessionConfig::default() };
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig { .. })));
    }

    #[test]
    fn skip_larger_than_key_capacity_rejected() {
        let config =
            SessionConfig { max_skip: 10, max_message_keys: 5, ..SessionConfig::default() };
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig { .. })));
    }
}

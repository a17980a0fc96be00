//! All session states held for one remote device.

use std::collections::VecDeque;

use parley_crypto::PublicKey;
use serde::{Deserialize, Serialize};

use super::session::SessionState;
use crate::store::StoreError;

/// Current session state plus recently superseded ones.
///
/// A state is archived when a newer session is established with the same
/// device. Archived states still get a chance to decrypt, which absorbs races
/// where both sides initiated or a reply targets an older session. At most
/// `max_archived_states` are kept, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    current: Option<SessionState>,
    previous: VecDeque<SessionState>,
}

impl SessionRecord {
    /// Record holding a single current state.
    pub fn new(state: SessionState) -> Self {
        Self { current: Some(state), previous: VecDeque::new() }
    }

    /// The current state.
    pub fn current(&self) -> Option<&SessionState> {
        self.current.as_ref()
    }

    /// Archived states, newest first.
    pub fn previous_states(&self) -> impl Iterator<Item = &SessionState> {
        self.previous.iter()
    }

    /// Number of archived states.
    pub fn archived_count(&self) -> usize {
        self.previous.len()
    }

    /// Whether the record holds a current state.
    pub fn has_current_state(&self) -> bool {
        self.current.is_some()
    }

    /// Whether any state (current or archived) was started from `base_key`.
    pub fn has_session_state(&self, base_key: &PublicKey) -> bool {
        self.current.iter().chain(self.previous.iter()).any(|s| s.base_key() == base_key)
    }

    /// Replace the current state in place without archiving.
    pub(crate) fn set_current(&mut self, state: SessionState) {
        self.current = Some(state);
    }

    /// Make `state` current, archiving the existing current state.
    pub fn promote_state(&mut self, state: SessionState, max_archived_states: usize) {
        self.archive_current_state(max_archived_states);
        self.current = Some(state);
    }

    /// Move the current state into the archive.
    pub fn archive_current_state(&mut self, max_archived_states: usize) {
        if let Some(current) = self.current.take() {
            self.previous.push_front(current);
            self.previous.truncate(max_archived_states);
        }
    }

    /// Replace the archived state at `index` with `state` and make it current.
    pub(crate) fn promote_old_state(
        &mut self,
        index: usize,
        state: SessionState,
        max_archived_states: usize,
    ) {
        self.previous.remove(index);
        self.promote_state(state, max_archived_states);
    }

    /// Serialize for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a persisted record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        ciborium::de::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

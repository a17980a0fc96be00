//! Reference model of a two-party conversation over a lossy courier.

use std::collections::HashSet;

use super::operation::{Operation, OperationError, OperationResult, PartyId};

#[derive(Debug, Clone)]
struct ModelEnvelope {
    id: u64,
    to: usize,
    plaintext: Vec<u8>,
}

/// Model world.
///
/// Party 0 starts with a session (it consumed party 1's bundle); party 1 gets
/// one as soon as any message reaches it. In-flight order and slot wrapping
/// match [`Courier`](crate::Courier) exactly.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    in_flight: Vec<ModelEnvelope>,
    delivered: HashSet<u64>,
    has_session: [bool; 2],
    next_id: u64,
}

impl Default for ModelWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelWorld {
    /// Initiator holds a session, responder does not.
    pub fn new() -> Self {
        Self {
            in_flight: Vec::new(),
            delivered: HashSet::new(),
            has_session: [true, false],
            next_id: 0,
        }
    }

    /// Map a generated party id onto 0 or 1.
    pub fn party_index(id: PartyId) -> usize {
        usize::from(id % 2)
    }

    /// Apply an operation and return the expected result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Send { from, content } => {
                let from = Self::party_index(*from);
                if !self.has_session[from] {
                    return OperationResult::Error(OperationError::NoSession);
                }
                let id = self.next_id;
                self.next_id += 1;
                self.in_flight.push(ModelEnvelope {
                    id,
                    to: 1 - from,
                    plaintext: content.to_bytes(),
                });
                OperationResult::Sent
            },
            Operation::Deliver { slot } => {
                let Some(index) = self.index(*slot) else {
                    return OperationResult::Idle;
                };
                let envelope = self.in_flight.remove(index);
                if !self.delivered.insert(envelope.id) {
                    return OperationResult::Error(OperationError::DuplicateMessage);
                }
                self.has_session[envelope.to] = true;
                OperationResult::Delivered(envelope.plaintext)
            },
            Operation::Duplicate { slot } => {
                if let Some(index) = self.index(*slot) {
                    let copy = self.in_flight[index].clone();
                    self.in_flight.push(copy);
                }
                OperationResult::Idle
            },
            Operation::Drop { slot } => {
                if let Some(index) = self.index(*slot) {
                    self.in_flight.remove(index);
                }
                OperationResult::Idle
            },
        }
    }

    /// Messages in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn index(&self, slot: u8) -> Option<usize> {
        if self.in_flight.is_empty() {
            None
        } else {
            Some(usize::from(slot) % self.in_flight.len())
        }
    }
}

//! Unreliable message delivery.
//!
//! Holds encoded messages in flight and lets a test (or the model-based
//! driver) deliver, duplicate or drop them in any order. Slots wrap modulo
//! the number of messages in flight, so any `u8` picks a valid message.

use bytes::Bytes;
use parley_core::ProtocolAddress;

/// One message in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Identifier assigned when posted; duplicates share it.
    pub id: u64,
    /// Sender.
    pub from: ProtocolAddress,
    /// Recipient.
    pub to: ProtocolAddress,
    /// Encoded message.
    pub bytes: Bytes,
}

/// In-flight message queue with adversarial delivery.
#[derive(Debug, Default)]
pub struct Courier {
    in_flight: Vec<Envelope>,
    next_id: u64,
}

impl Courier {
    /// Empty courier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message. Returns its envelope id.
    pub fn post(&mut self, from: &ProtocolAddress, to: &ProtocolAddress, bytes: Bytes) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.in_flight.push(Envelope { id, from: from.clone(), to: to.clone(), bytes });
        id
    }

    /// Number of messages in flight.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Remove and return the message at `slot`.
    pub fn take(&mut self, slot: u8) -> Option<Envelope> {
        let index = self.index(slot)?;
        Some(self.in_flight.remove(index))
    }

    /// Queue a copy of the message at `slot`.
    pub fn duplicate(&mut self, slot: u8) -> Option<u64> {
        let index = self.index(slot)?;
        let copy = self.in_flight[index].clone();
        let id = copy.id;
        self.in_flight.push(copy);
        Some(id)
    }

    /// Discard the message at `slot`.
    pub fn drop_message(&mut self, slot: u8) -> Option<u64> {
        self.take(slot).map(|envelope| envelope.id)
    }

    /// Remove and return everything in flight, oldest first.
    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.in_flight)
    }

    fn index(&self, slot: u8) -> Option<usize> {
        if self.in_flight.is_empty() {
            None
        } else {
            Some(usize::from(slot) % self.in_flight.len())
        }
    }
}

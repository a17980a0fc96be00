//! Operations for model-based testing.
//!
//! Generated randomly by proptest (through `arbitrary`) and applied to both
//! the model and the real parties.

use arbitrary::Arbitrary;

/// Party identifier: even is the initiator, odd the responder.
pub type PartyId = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Party encrypts a message to the other party and posts it.
    Send {
        /// Sending party.
        from: PartyId,
        /// Message content.
        content: SmallMessage,
    },

    /// Courier delivers the message at `slot`.
    Deliver {
        /// In-flight slot (wraps).
        slot: u8,
    },

    /// Courier queues a second copy of the message at `slot`.
    Duplicate {
        /// In-flight slot (wraps).
        slot: u8,
    },

    /// Courier loses the message at `slot`.
    Drop {
        /// In-flight slot (wraps).
        slot: u8,
    },
}

/// Small message content for testing.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallMessage {
    /// Message seed (expanded to content).
    pub seed: u8,
    /// Message length hint (0-3 maps to empty/small/medium/large).
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to actual message bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len: u8 = match self.size_class % 4 {
            0 => 0,
            1 => 8,
            2 => 64,
            _ => 200,
        };

        (0..len).map(|i| self.seed.wrapping_add(i)).collect()
    }
}

/// Observable result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Message was posted.
    Sent,
    /// Message was delivered and decrypted to this plaintext.
    Delivered(Vec<u8>),
    /// Courier-only operation, or nothing in flight.
    Idle,
    /// Operation failed.
    Error(OperationError),
}

/// Errors the model predicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Sender has no session yet.
    NoSession,
    /// Message was already delivered once.
    DuplicateMessage,
    /// Anything the model does not predict.
    Unexpected(String),
}

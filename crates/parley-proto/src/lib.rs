//! Parley wire format
//!
//! Versioned, explicit encoding of the messages a session produces. Every
//! message travels in an envelope:
//!
//! ```text
//! ┌───────────┬─────────┬──────┬──────────────────┬────────────────────┐
//! │ magic "PL"│ version │ kind │ payload len (BE) │ CBOR payload       │
//! │  2 bytes  │ 1 byte  │1 byte│     4 bytes      │ payload len bytes  │
//! └───────────┴─────────┴──────┴──────────────────┴────────────────────┘
//! ```
//!
//! The fixed header is parsed with `zerocopy`; the payload is CBOR. A
//! decoder never guesses: unknown versions, unknown kinds, truncated input,
//! trailing bytes and oversized payloads are all rejected.
//!
//! # Message Kinds
//!
//! - [`RatchetMessage`]: ordinary ratchet message (sender ratchet key, chain
//!   index, previous chain length, ciphertext)
//! - [`PreKeyMessage`]: initial message, additionally carrying the sender's
//!   identity key, base key and the referenced pre-key identifiers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod header;
pub mod message;

pub use error::ProtocolError;
pub use header::{
    CURRENT_VERSION, EnvelopeHeader, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE, MessageKind,
};
pub use message::{CiphertextMessage, PreKeyMessage, RatchetMessage};

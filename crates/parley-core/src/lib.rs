//! Parley Session Core
//!
//! Pairwise session protocol: asynchronous X3DH-style session establishment
//! followed by a double ratchet. All logic is synchronous and Sans-IO; the
//! caller supplies randomness through [`Environment`] and persistence through
//! the store traits.
//!
//! # Architecture
//!
//! ```text
//! SessionBuilder ──► SessionRecord / SessionState (creation)
//!                          │
//! SessionCipher ───────────┤ (per message: encrypt / decrypt)
//!                          ▼
//!                 parley-crypto key hierarchy ──► AEAD
//!                          │
//!                          ▼
//!                 stores (identity, pre-keys, sessions)
//! ```
//!
//! # Invariants
//!
//! - Atomic updates: every operation works on a copy of the session record;
//!   the record is persisted only when the whole operation succeeds
//! - Bounded memory: skipped message keys, receiving chains and archived
//!   states are all capped by [`SessionConfig`]
//! - One-time pre-keys are removed after the session they created is stored
//!
//! # Concurrency
//!
//! Nothing here locks. Callers serialize operations per remote device and
//! hold that critical section across a whole decrypt, including persistence.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod address;
pub mod builder;
pub mod bundle;
pub mod cipher;
pub mod config;
pub mod env;
pub mod error;
pub mod padding;
pub mod state;
pub mod store;

pub use address::ProtocolAddress;
pub use builder::{IncomingSession, SessionBuilder, build_for_incoming, build_for_outgoing};
pub use bundle::{OneTimePreKey, PreKeyBundle, PreKeyRecord, SignedPreKeyRecord};
pub use cipher::{SessionCipher, decrypt_record, encrypt_record};
pub use config::SessionConfig;
pub use env::{Environment, SystemEnv};
pub use error::SessionError;
pub use padding::{pad, unpad};
pub use state::{
    PendingPreKey, ReceivingChain, SendingChain, SessionOrigin, SessionRecord, SessionState,
};
pub use store::{
    IdentityKeyStore, MemoryStore, PreKeyStore, ProtocolStore, SessionStore, SignedPreKeyStore,
    StoreError,
};

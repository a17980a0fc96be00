//! Session state and the record that owns it.
//!
//! ```text
//! SessionRecord
//! ├── current: SessionState
//! │   ├── root_key
//! │   ├── sending_chain   (local ratchet key pair, chain key)
//! │   └── receiving_chains (per remote ratchet key, bounded, skipped keys)
//! └── previous: [SessionState] (newest first, bounded)
//! ```

mod chain;
mod record;
mod session;

pub use chain::{ReceivingChain, SendingChain};
pub use record::SessionRecord;
pub use session::{PendingPreKey, SessionOrigin, SessionState};

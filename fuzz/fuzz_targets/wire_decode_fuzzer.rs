//! Fuzz target for the wire envelope decoder
//!
//! # Strategy
//!
//! - Raw bytes straight into `CiphertextMessage::decode`
//! - Valid-looking headers with hostile CBOR payloads
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - Anything that decodes re-encodes to exactly the input bytes

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::CiphertextMessage;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = CiphertextMessage::decode(data) else {
        return;
    };

    let encoded = message.encode().expect("decoded message re-encodes");
    assert_eq!(&encoded[..], data, "accepted input is not the canonical encoding");
});

//! Fuzz target for the session decrypt path
//!
//! # Strategy
//!
//! - Establish a real session, then feed the responder mutated copies of
//!   genuine messages: flipped bits, swapped counters, foreign ratchet keys,
//!   truncated ciphertexts
//!
//! # Invariants
//!
//! - NEVER panic on a hostile message
//! - A rejected message leaves the persisted session byte-for-byte unchanged

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_core::SessionStore;
use parley_harness::{Party, SimEnv};
use parley_proto::CiphertextMessage;

#[derive(Debug, Arbitrary)]
enum Mutation {
    FlipCiphertextBit { index: u16, bit: u8 },
    SetCounter(u32),
    SetPreviousCounter(u32),
    SetRatchetKey([u8; 32]),
    Truncate(u16),
}

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    messages_ahead: u8,
    mutations: Vec<Mutation>,
}

fuzz_target!(|input: Input| {
    let env = SimEnv::with_seed(input.seed);
    let alice = Party::new("alice", env.clone()).expect("alice");
    let bob = Party::new("bob", env).expect("bob");
    let bundle = bob.publish_bundle(Some(1)).expect("bundle");
    alice.start_session(bob.address(), &bundle).expect("start");

    let first = alice.send(bob.address(), b"first").expect("send");
    bob.receive(alice.address(), &first).expect("receive");

    let mut genuine = Vec::new();
    for _ in 0..=(input.messages_ahead % 8) {
        genuine.push(alice.send(bob.address(), b"genuine").expect("send"));
    }
    let target = genuine.last().expect("at least one message");

    let snapshot = || {
        bob.store()
            .load_session(alice.address())
            .expect("load")
            .expect("session")
            .to_bytes()
            .expect("serialize")
    };

    for mutation in input.mutations.iter().take(16) {
        let mut message = CiphertextMessage::decode(target).expect("decode genuine");
        let ratchet = match &mut message {
            CiphertextMessage::Ratchet(m) => m,
            CiphertextMessage::PreKey(m) => &mut m.message,
        };
        match mutation {
            Mutation::FlipCiphertextBit { index, bit } => {
                if ratchet.ciphertext.is_empty() {
                    continue;
                }
                let i = usize::from(*index) % ratchet.ciphertext.len();
                ratchet.ciphertext[i] ^= 1 << (bit % 8);
            },
            Mutation::SetCounter(counter) => ratchet.counter = *counter,
            Mutation::SetPreviousCounter(previous) => ratchet.previous_counter = *previous,
            Mutation::SetRatchetKey(key) => ratchet.ratchet_key = *key,
            Mutation::Truncate(len) => ratchet.ciphertext.truncate(usize::from(*len)),
        }

        let before = snapshot();
        let cipher = bob.cipher(alice.address()).expect("cipher");
        if cipher.decrypt(&message).is_err() {
            assert_eq!(snapshot(), before, "rejected message mutated session");
        }
    }

    // Mutations may have been no-ops that consumed the genuine message.
    let _ = bob.receive(alice.address(), target);
});

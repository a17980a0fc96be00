//! Deterministic simulation harness for Parley session testing.
//!
//! Seeded implementations of the [`Environment`](parley_core::Environment)
//! trait plus a lossy, reordering courier, so that a whole conversation can
//! be replayed exactly from one seed.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and the real parties,
//! and their observable results are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod courier;
pub mod model;
pub mod party;
pub mod sim_env;

pub use courier::{Courier, Envelope};
pub use model::{
    ModelWorld, Operation, OperationError, OperationResult, PartyId, SmallMessage,
};
pub use party::Party;
pub use sim_env::SimEnv;

/// Install a `tracing` subscriber for test runs.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(filter)
        .try_init();
}

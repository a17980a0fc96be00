//! Reference model for model-based testing.
//!
//! The model captures what a two-party conversation must look like from the
//! outside, without any cryptography: every posted message is delivered at
//! most once with its original content, whatever order the courier picks,
//! and a second delivery of the same message is rejected as a duplicate.
//!
//! # Design Principles
//!
//! - Simplicity: the model should be obviously correct
//! - Observable behavior only: no keys, no chains
//! - Deterministic: same inputs produce same outputs

pub mod operation;
mod world;

pub use operation::{Operation, OperationError, OperationResult, PartyId, SmallMessage};
pub use world::ModelWorld;

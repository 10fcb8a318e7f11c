//! Composition engine infrastructure

pub mod amplification;
pub mod coefficients;
pub mod commutativity;
pub mod context;
pub mod derived;
pub mod inputs;
pub mod interleaving;
pub mod poisoning;
pub mod sequence_search;
pub mod simulator;

pub use context::CompositionContext;
pub use derived::derive_invariants;
pub use inputs::{CONCRETE_SEED, DEFAULT_AMOUNT};
pub use simulator::Simulator;

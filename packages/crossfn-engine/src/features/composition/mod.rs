//! Composition Engine
//!
//! Executes short call sequences on an abstract state to test whether
//! functions that are individually correct stay correct in combination:
//! commutativity of coupled pairs, interleaving inside execution windows,
//! rounding amplification, state poisoning and bounded invariant-sequence
//! search.
//!
//! # Usage
//! ```rust,ignore
//! use crossfn_engine::features::composition::{commutativity, CompositionContext};
//!
//! let ctx = CompositionContext::new(&index, &graph, &input, &config);
//! let finding = commutativity::check_pair(&ctx, a, b, &mut budget, &mut diagnostics)?;
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{AbstractState, AbstractValue, CallSpec, LinearForm, Outcome, Seed};
pub use infrastructure::{
    amplification, commutativity, derive_invariants, interleaving, poisoning, sequence_search,
    CompositionContext, Simulator, CONCRETE_SEED, DEFAULT_AMOUNT,
};

//! Dependency Graph Builder
//!
//! Writer/reader relation per storage variable, inlined function footprints,
//! function-pair couplings and invariant movers.
//!
//! # Usage
//! ```rust,ignore
//! use crossfn_engine::features::dependency_graph::DependencyGraphBuilder;
//!
//! let graph = DependencyGraphBuilder::new(&config).build(&input, &invariants)?;
//! for coupling in &graph.couplings {
//!     println!("{} <-> {}: {:?}", coupling.first, coupling.second, coupling.shared);
//! }
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{Coupling, DependencyGraph, Footprint, InvariantTerms, VarRelations};
pub use infrastructure::{
    CallResolution, DependencyGraphBuilder, InternalCallGraph, ModelValidator,
};

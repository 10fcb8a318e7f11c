//! Finding Aggregator
//!
//! Merges per-unit outputs after the parallel phase: deduplication by
//! content id, severity scoring, deterministic ordering and the run summary.

pub mod domain;
pub mod infrastructure;

pub use domain::{RunSummary, UnitOutput};
pub use infrastructure::{scoring, Aggregator};

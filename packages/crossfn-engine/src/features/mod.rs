//! Feature modules - each feature follows Hexagonal Architecture
//!
//! Each feature contains:
//! - domain/         - Pure data types
//! - infrastructure/ - Algorithms over the program model

// Writer/reader relation, footprints, couplings
pub mod dependency_graph;

// Execution windows and stale-data
pub mod window_analysis;

// Multi-call sequences on an abstract state
pub mod composition;

// Unverified external values flowing into accounting state
pub mod accounting_taint;

// Merge point after the parallel phase
pub mod aggregation;

pub mod triage;

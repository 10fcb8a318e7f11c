//! Window analysis infrastructure

pub mod analyzer;
pub mod trace_enumerator;

pub use analyzer::{compute_windows, WindowAnalyzer, WindowOutcome};
pub use trace_enumerator::TraceEnumerator;

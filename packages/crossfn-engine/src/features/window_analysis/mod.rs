//! Window Analyzer
//!
//! Computes, at every external call of every function trace, which storage
//! variables are already updated and which are still pending, and which view
//! functions would observe the inconsistent mix.

pub mod domain;
pub mod infrastructure;

pub use domain::{
    ExecutionWindow, StaleView, StepKind, Trace, TraceSet, TraceStep, WindowReport,
};
pub use infrastructure::{compute_windows, TraceEnumerator, WindowAnalyzer, WindowOutcome};

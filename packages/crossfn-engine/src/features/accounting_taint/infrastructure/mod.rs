//! Accounting taint infrastructure

pub mod detector;
pub mod propagator;

pub use detector::AccountingTaintDetector;
pub use propagator::TaintPropagator;

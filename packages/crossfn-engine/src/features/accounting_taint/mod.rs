//! Accounting Taint Detector
//!
//! Finds functions anyone can call that write trusted bookkeeping state from
//! manipulable external inputs.
//!
//! # Usage
//! ```rust,ignore
//! use crossfn_engine::features::accounting_taint::AccountingTaintDetector;
//!
//! let findings = AccountingTaintDetector::new(&index, &graph, &config).detect(function);
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{GuardCheck, Taint, TaintSource, TaintSummary, TaintedWrite};
pub use infrastructure::{AccountingTaintDetector, TaintPropagator};

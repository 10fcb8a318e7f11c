//! Entry-point triage
//!
//! Orders externally callable functions so a reviewer starts with the ones
//! that call out, touch sensitive state and write the most.

pub mod domain;
pub mod infrastructure;

pub use domain::{TriageEntry, DEFAULT_TRIAGE_LIMIT};
pub use infrastructure::triage_entrypoints;

//! Common test utilities for crossfn-engine
//!
//! Builders for program models and the fixtures shared by the integration
//! tests.

#![allow(dead_code)]

mod builders;
mod fixtures;

pub use builders::*;
pub use fixtures::*;

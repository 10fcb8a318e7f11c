//! Aggregation infrastructure

pub mod aggregator;
pub mod scoring;

pub use aggregator::Aggregator;

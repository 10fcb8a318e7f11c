//! Shared models and utilities used by every feature

pub mod budget;
pub mod models;

//! Dependency graph infrastructure

pub mod builder;
pub mod call_graph;
pub mod validator;

pub use builder::DependencyGraphBuilder;
pub use call_graph::{widening_set, CallResolution, InternalCallGraph};
pub use validator::ModelValidator;

//! Error types for crossfn-engine
//!
//! Fatal conditions only. Non-fatal conditions travel as
//! [`Diagnostic`](crate::shared::models::Diagnostic) values in the run summary.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// A variable, function or callback anchor is referenced but not declared
    #[error("Model inconsistency: unresolved reference '{reference}' in {context}{}", more_suffix(.unresolved))]
    ModelInconsistency {
        reference: String,
        context: String,
        /// Every unresolved reference found in the model, `reference (context)`
        unresolved: Vec<String>,
    },

    /// Structurally invalid model (bad bindings, storage referenced from a body)
    #[error("Malformed model: {0}")]
    MalformedModel(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input or report (de)serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

fn more_suffix(unresolved: &[String]) -> String {
    if unresolved.len() > 1 {
        format!(" (and {} more)", unresolved.len() - 1)
    } else {
        String::new()
    }
}

impl EngineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        EngineError::MalformedModel(msg.into())
    }

    pub fn serialization(msg: impl ToString) -> Self {
        EngineError::Serialization(msg.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::serialization(err)
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        EngineError::serialization(err)
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

//! Triage domain models

use crate::shared::models::{ContractId, FunctionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of entries kept by the CLI
pub const DEFAULT_TRIAGE_LIMIT: usize = 50;

/// Ranking signals of one entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageEntry {
    pub function: FunctionId,
    pub contract: ContractId,
    pub external_calls: usize,
    /// Writes to high/critical variables
    pub sensitive_writes: usize,
    pub writes: usize,
    pub reads: usize,
    /// Required role, `None` when callable by anyone
    pub role: Option<String>,
    pub permissionless: bool,
}

impl TriageEntry {
    /// Descending rank key
    pub fn rank_key(&self) -> (usize, usize, usize, usize) {
        (self.external_calls, self.sensitive_writes, self.writes, self.reads)
    }
}

impl fmt::Display for TriageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- {} | calls={} sensitive_writes={} writes={} reads={} role={}",
            self.function,
            self.external_calls,
            self.sensitive_writes,
            self.writes,
            self.reads,
            self.role.as_deref().unwrap_or("none")
        )
    }
}

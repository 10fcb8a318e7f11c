//! Aggregation domain models

use crate::shared::models::{Diagnostic, Finding, FindingCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of one unit of work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitOutput {
    /// `kind:subject`, e.g. `windows:Vault.deposit`
    pub unit: String,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    /// Budget exhausted before the unit finished
    pub incomplete: bool,
}

impl UnitOutput {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            ..Default::default()
        }
    }
}

/// Coverage and diagnostics of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Every category appears, zero counts included
    pub counts: BTreeMap<FindingCategory, usize>,
    pub total_findings: usize,
    pub units_total: usize,
    pub units_completed: usize,
    pub units_incomplete: usize,
    pub incomplete_units: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunSummary {
    pub fn count(&self, category: FindingCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.units_incomplete == 0
    }
}

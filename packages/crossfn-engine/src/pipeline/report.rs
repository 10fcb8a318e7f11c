//! Run report
//!
//! ```text
//! AnalysisReport
//! ├── findings: Vec<Finding>       (sorted on category, contract, function, id)
//! ├── summary:  RunSummary         (counts, coverage, diagnostics)
//! └── triage:   Vec<TriageEntry>   (ranked entry points)
//! ```

use crate::errors::Result;
use crate::features::aggregation::RunSummary;
use crate::features::triage::TriageEntry;
use crate::shared::models::{Finding, FindingCategory};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub findings: Vec<Finding>,
    pub summary: RunSummary,
    pub triage: Vec<TriageEntry>,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn findings_of(&self, category: FindingCategory) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.category == category)
    }
}

/// Plain-text rendering used by the CLI
impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} findings, {}/{} units complete",
            self.summary.total_findings, self.summary.units_completed, self.summary.units_total
        )?;
        for (category, count) in &self.summary.counts {
            writeln!(f, "  {:<26} {}", category.as_str(), count)?;
        }

        for finding in &self.findings {
            writeln!(f)?;
            writeln!(
                f,
                "[{}] {:.1} {}{}",
                finding.category.as_str(),
                finding.severity,
                finding.title,
                if finding.incomplete { " (incomplete)" } else { "" }
            )?;
            writeln!(f, "  id:       {}", finding.id)?;
            writeln!(f, "  function: {}", finding.function)?;
            let sequence = finding.sequence_display();
            if !sequence.is_empty() {
                writeln!(f, "  witness:  {}", sequence)?;
            }
            for line in &finding.evidence {
                writeln!(f, "  - {}", line)?;
            }
        }

        if !self.summary.diagnostics.is_empty() {
            writeln!(f)?;
            writeln!(f, "diagnostics:")?;
            for diagnostic in &self.summary.diagnostics {
                writeln!(f, "  {}", diagnostic)?;
            }
        }

        if !self.triage.is_empty() {
            writeln!(f)?;
            writeln!(f, "entry points:")?;
            for entry in &self.triage {
                writeln!(f, "{}", entry)?;
            }
        }
        Ok(())
    }
}

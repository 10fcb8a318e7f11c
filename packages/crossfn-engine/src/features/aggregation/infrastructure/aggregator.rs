//! Finding aggregator
//!
//! Single merge point after every unit has finished. Equivalent findings
//! (same content id) collapse into one whose severity is the highest
//! individual score plus a corroboration bonus; the result is sorted on
//! (category, contract, function, id) so completion order never shows.

use super::scoring::merged_severity;
use crate::features::aggregation::domain::{RunSummary, UnitOutput};
use crate::shared::models::{Diagnostic, Finding, FindingCategory};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Merge unit outputs into the final finding list and run summary
    pub fn aggregate(&self, outputs: &[UnitOutput]) -> (Vec<Finding>, RunSummary) {
        let mut ordered: Vec<&UnitOutput> = outputs.iter().collect();
        ordered.sort_by(|a, b| a.unit.cmp(&b.unit));

        let mut groups: BTreeMap<&str, Vec<&Finding>> = BTreeMap::new();
        for output in &ordered {
            for finding in &output.findings {
                groups.entry(finding.id.as_str()).or_default().push(finding);
            }
        }

        let mut findings: Vec<Finding> = groups.into_values().filter_map(merge).collect();
        findings.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.contract.cmp(&b.contract))
                .then_with(|| a.function.cmp(&b.function))
                .then_with(|| a.id.cmp(&b.id))
        });

        let summary = summarize(&ordered, &findings);
        info!(
            "aggregated {} findings from {} units ({} incomplete, {} diagnostics)",
            summary.total_findings,
            summary.units_total,
            summary.units_incomplete,
            summary.diagnostics.len()
        );
        (findings, summary)
    }
}

/// Collapse findings sharing an id
fn merge(group: Vec<&Finding>) -> Option<Finding> {
    let best = group.iter().copied().max_by(|a, b| {
        a.severity
            .total_cmp(&b.severity)
            // complete witnesses win ties, then the smaller evidence list
            .then_with(|| b.incomplete.cmp(&a.incomplete))
            .then_with(|| b.evidence.cmp(&a.evidence))
    })?;
    if group.len() == 1 {
        return Some(best.clone());
    }

    let mut merged = best.rescored(merged_severity(best.severity, group.len()));
    merged.incomplete = group.iter().all(|f| f.incomplete);
    let mut evidence: BTreeSet<String> = merged.evidence.iter().cloned().collect();
    for other in &group {
        for line in &other.evidence {
            if evidence.insert(line.clone()) {
                merged.evidence.push(line.clone());
            }
        }
    }
    merged
        .details
        .insert("corroborating_units".to_string(), group.len().to_string());
    Some(merged)
}

fn summarize(outputs: &[&UnitOutput], findings: &[Finding]) -> RunSummary {
    let mut counts: BTreeMap<FindingCategory, usize> =
        FindingCategory::ALL.iter().map(|c| (*c, 0)).collect();
    for finding in findings {
        *counts.entry(finding.category).or_insert(0) += 1;
    }

    let diagnostics: BTreeSet<Diagnostic> = outputs
        .iter()
        .flat_map(|o| o.diagnostics.iter().cloned())
        .collect();
    let incomplete_units: Vec<String> = outputs
        .iter()
        .filter(|o| o.incomplete)
        .map(|o| o.unit.clone())
        .collect();

    RunSummary {
        counts,
        total_findings: findings.len(),
        units_total: outputs.len(),
        units_completed: outputs.len() - incomplete_units.len(),
        units_incomplete: incomplete_units.len(),
        incomplete_units,
        diagnostics: diagnostics.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::VarId;

    fn finding(category: FindingCategory, function: &str, severity: f64) -> Finding {
        Finding::builder(category, "C".into(), format!("C.{}", function).into())
            .variables([&VarId::from("C.x")])
            .severity(severity)
            .evidence(format!("seen at {}", severity))
            .build()
    }

    #[test]
    fn test_duplicates_merge_with_bonus() {
        let outputs = vec![
            UnitOutput {
                findings: vec![finding(FindingCategory::StaleData, "f", 5.0)],
                ..UnitOutput::new("windows:C.f")
            },
            UnitOutput {
                findings: vec![finding(FindingCategory::StaleData, "f", 6.0)],
                ..UnitOutput::new("windows:C.g")
            },
        ];
        let (findings, summary) = Aggregator::new().aggregate(&outputs);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, 6.5);
        assert_eq!(findings[0].evidence.len(), 2);
        assert_eq!(summary.count(FindingCategory::StaleData), 1);
        assert_eq!(summary.count(FindingCategory::NonCommutative), 0);
    }

    #[test]
    fn test_incomplete_units_are_counted() {
        let outputs = vec![
            UnitOutput {
                incomplete: true,
                diagnostics: vec![Diagnostic::BudgetExceeded {
                    unit: "sequence:inv".to_string(),
                    steps: 10,
                    elapsed_ms: 1,
                }],
                ..UnitOutput::new("sequence:inv")
            },
            UnitOutput::new("windows:C.f"),
        ];
        let (_, summary) = Aggregator::new().aggregate(&outputs);
        assert_eq!(summary.units_total, 2);
        assert_eq!(summary.units_incomplete, 1);
        assert_eq!(summary.incomplete_units, vec!["sequence:inv".to_string()]);
        assert_eq!(summary.diagnostics.len(), 1);
        assert!(!summary.is_complete());
    }
}

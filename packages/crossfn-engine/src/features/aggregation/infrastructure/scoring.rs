//! Severity scoring
//!
//! `score = base(category) + adjustment(max sensitivity of witness variables)`,
//! clamped to `[0, 10]`. Merging equivalent findings adds `0.5` per extra
//! witness on top of the highest score.

use crate::shared::models::{clamp_severity, FindingCategory, ModelIndex, Sensitivity, VarId};

/// Bonus per duplicate merged into one finding
pub const CORROBORATION_BONUS: f64 = 0.5;

pub fn base_severity(category: FindingCategory) -> f64 {
    match category {
        FindingCategory::StaleData => 5.0,
        FindingCategory::NonCommutative => 6.0,
        FindingCategory::Interleaving => 7.0,
        FindingCategory::Amplification => 5.5,
        FindingCategory::StatePoisoning => 6.5,
        FindingCategory::InvariantSequence => 8.0,
        FindingCategory::PermissionlessAccounting => 8.5,
    }
}

pub fn sensitivity_adjustment(sensitivity: Sensitivity) -> f64 {
    match sensitivity {
        Sensitivity::Critical => 1.5,
        Sensitivity::High => 1.0,
        Sensitivity::Medium => 0.0,
        Sensitivity::Low => -1.0,
    }
}

pub fn score(category: FindingCategory, sensitivity: Sensitivity) -> f64 {
    clamp_severity(base_severity(category) + sensitivity_adjustment(sensitivity))
}

/// Highest sensitivity among `vars`; unknown variables count as `Low`
pub fn max_sensitivity<'v>(index: &ModelIndex<'_>, vars: impl IntoIterator<Item = &'v VarId>) -> Sensitivity {
    vars.into_iter()
        .filter_map(|v| index.variable(v))
        .map(|v| v.sensitivity)
        .max()
        .unwrap_or_default()
}

/// Severity of `count` equivalent findings whose best score is `best`
pub fn merged_severity(best: f64, count: usize) -> f64 {
    clamp_severity(best + CORROBORATION_BONUS * count.saturating_sub(1) as f64)
}

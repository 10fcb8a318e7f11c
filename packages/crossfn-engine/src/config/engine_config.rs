//! Engine configuration
//!
//! The complete runtime surface of the analysis core: five numeric knobs plus
//! the step budget that backs the wall-clock budget.

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::validation::{check_range, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Internal-call inlining depth (1..=16)
    pub inline_depth: usize,

    /// Traces enumerated per function before merging (1..=4096)
    pub max_traces: usize,

    /// Maximum invariant-sequence length (1..=8)
    pub sequence_depth: usize,

    /// Wall-clock budget per unit in milliseconds (0 = unlimited)
    pub unit_time_budget_ms: u64,

    /// Simulation/enumeration steps per unit (>= 1000)
    pub unit_step_budget: u64,

    /// Split factors `k` for the amplification test (each 2..=10000)
    pub amplification_factors: Vec<u64>,
}

pub const MAX_UNIT_TIME_BUDGET_MS: u64 = 3_600_000;
pub const MIN_UNIT_STEP_BUDGET: u64 = 1_000;

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

impl EngineConfig {
    /// Complete configuration for a preset
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                inline_depth: 2,
                max_traces: 16,
                sequence_depth: 2,
                unit_time_budget_ms: 2_000,
                unit_step_budget: 200_000,
                amplification_factors: vec![10],
            },
            Preset::Balanced => Self {
                inline_depth: 4,
                max_traces: 64,
                sequence_depth: 4,
                unit_time_budget_ms: 10_000,
                unit_step_budget: 2_000_000,
                amplification_factors: vec![10, 100],
            },
            Preset::Thorough => Self {
                inline_depth: 8,
                max_traces: 512,
                sequence_depth: 6,
                unit_time_budget_ms: 60_000,
                unit_step_budget: 20_000_000,
                amplification_factors: vec![10, 100, 1000],
            },
        }
    }

    /// Builder: set inlining depth
    pub fn inline_depth(mut self, v: usize) -> Self {
        self.inline_depth = v;
        self
    }

    /// Builder: set trace bound
    pub fn max_traces(mut self, v: usize) -> Self {
        self.max_traces = v;
        self
    }

    /// Builder: set sequence-search depth
    pub fn sequence_depth(mut self, v: usize) -> Self {
        self.sequence_depth = v;
        self
    }

    /// Builder: set per-unit wall-clock budget
    pub fn unit_time_budget_ms(mut self, v: u64) -> Self {
        self.unit_time_budget_ms = v;
        self
    }

    /// Builder: set per-unit step budget
    pub fn unit_step_budget(mut self, v: u64) -> Self {
        self.unit_step_budget = v;
        self
    }

    /// Builder: set amplification split factors
    pub fn amplification_factors(mut self, v: Vec<u64>) -> Self {
        self.amplification_factors = v;
        self
    }

    /// Wall-clock budget, `None` when unlimited
    pub fn unit_time_budget(&self) -> Option<Duration> {
        match self.unit_time_budget_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Validatable for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "inline_depth",
            self.inline_depth,
            1,
            16,
            "Inlining depth must be at least 1",
        )?;
        check_range(
            "max_traces",
            self.max_traces,
            1,
            4096,
            "Trace bound must admit at least one trace",
        )?;
        check_range(
            "sequence_depth",
            self.sequence_depth,
            1,
            8,
            "Sequence search grows exponentially with depth",
        )?;
        check_range(
            "unit_time_budget_ms",
            self.unit_time_budget_ms,
            0,
            MAX_UNIT_TIME_BUDGET_MS,
            "Use 0 for an unlimited wall-clock budget",
        )?;
        check_range(
            "unit_step_budget",
            self.unit_step_budget,
            MIN_UNIT_STEP_BUDGET,
            u64::MAX,
            "Units need room for at least a few simulations",
        )?;

        if self.amplification_factors.is_empty() {
            return Err(ConfigError::Validation(
                "amplification_factors must contain at least one factor".to_string(),
            ));
        }
        for k in &self.amplification_factors {
            check_range(
                "amplification_factors",
                *k,
                2,
                10_000,
                "A split factor below 2 does not split",
            )?;
        }

        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "EngineConfig"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_balanced() {
        let config = EngineConfig::default();
        assert_eq!(config.inline_depth, 4);
        assert_eq!(config.max_traces, 64);
        assert_eq!(config.sequence_depth, 4);
        assert_eq!(config.amplification_factors, vec![10, 100]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_all_presets_valid() {
        for preset in [Preset::Fast, Preset::Balanced, Preset::Thorough] {
            assert!(EngineConfig::from_preset(preset).validate().is_ok());
        }
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        assert!(EngineConfig::default().inline_depth(0).validate().is_err());
        assert!(EngineConfig::default().max_traces(5000).validate().is_err());
        assert!(EngineConfig::default().sequence_depth(9).validate().is_err());
        assert!(EngineConfig::default().unit_step_budget(10).validate().is_err());
        assert!(EngineConfig::default()
            .amplification_factors(vec![])
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .amplification_factors(vec![1])
            .validate()
            .is_err());
    }

    #[test]
    fn test_zero_time_budget_is_unlimited() {
        let config = EngineConfig::default().unit_time_budget_ms(0);
        assert!(config.validate().is_ok());
        assert!(config.unit_time_budget().is_none());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("sequence_depth: 3\n").unwrap();
        assert_eq!(config.sequence_depth, 3);
        assert_eq!(config.inline_depth, 4);
    }
}

//! Configuration and input I/O (YAML/JSON loading)
//!
//! Used by the binary and tests only; the analysis core never touches files.

use super::engine_config::EngineConfig;
use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::validation::Validatable;
use crate::errors::Result;
use crate::shared::models::AnalysisInput;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration file schema
///
/// ```yaml
/// preset: thorough
/// overrides:
///   sequence_depth: 5
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Base preset
    #[serde(default)]
    pub preset: Preset,

    /// Fine-grained overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ConfigOverrides>,
}

/// Per-knob overrides on top of a preset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_traces: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_time_budget_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_step_budget: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amplification_factors: Option<Vec<u64>>,
}

impl ConfigFile {
    /// Resolve preset + overrides into a validated config
    pub fn resolve(&self) -> ConfigResult<EngineConfig> {
        let mut config = EngineConfig::from_preset(self.preset);
        if let Some(o) = &self.overrides {
            if let Some(v) = o.inline_depth {
                config.inline_depth = v;
            }
            if let Some(v) = o.max_traces {
                config.max_traces = v;
            }
            if let Some(v) = o.sequence_depth {
                config.sequence_depth = v;
            }
            if let Some(v) = o.unit_time_budget_ms {
                config.unit_time_budget_ms = v;
            }
            if let Some(v) = o.unit_step_budget {
                config.unit_step_budget = v;
            }
            if let Some(v) = &o.amplification_factors {
                config.amplification_factors = v.clone();
            }
        }
        config.validate()?;
        Ok(config)
    }
}

impl EngineConfig {
    /// Parse a YAML configuration document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        file.resolve()
    }

    /// Load a YAML configuration file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Export as a YAML config file (preset + full overrides)
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFile {
            preset: Preset::Balanced,
            overrides: Some(ConfigOverrides {
                inline_depth: Some(self.inline_depth),
                max_traces: Some(self.max_traces),
                sequence_depth: Some(self.sequence_depth),
                unit_time_budget_ms: Some(self.unit_time_budget_ms),
                unit_step_budget: Some(self.unit_step_budget),
                amplification_factors: Some(self.amplification_factors.clone()),
            }),
        };
        serde_yaml::to_string(&file).map_err(ConfigError::from)
    }
}

/// Load an analysis input; `.yaml`/`.yml` parse as YAML, anything else as JSON
pub fn load_input(path: impl AsRef<Path>) -> Result<AnalysisInput> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    parse_input(&content, is_yaml)
}

/// Parse an analysis input from a string
pub fn parse_input(content: &str, yaml: bool) -> Result<AnalysisInput> {
    if yaml {
        Ok(serde_yaml::from_str(content)?)
    } else {
        Ok(serde_json::from_str(content)?)
    }
}

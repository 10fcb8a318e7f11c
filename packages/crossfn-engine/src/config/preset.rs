//! Preset configurations
//!
//! Presets provide complete engine configurations for common use cases.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Configuration preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// CI: shallow inlining, few traces, short sequences
    ///
    /// - inline_depth=2, max_traces=16, sequence_depth=2
    /// - 2s per unit
    Fast,

    /// Default audit settings
    ///
    /// - inline_depth=4, max_traces=64, sequence_depth=4
    /// - 10s per unit
    #[default]
    Balanced,

    /// Deep review
    ///
    /// - inline_depth=8, max_traces=512, sequence_depth=6
    /// - 60s per unit, extra amplification factor 1000
    Thorough,
}

impl Preset {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Thorough => "thorough",
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "thorough" => Ok(Self::Thorough),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

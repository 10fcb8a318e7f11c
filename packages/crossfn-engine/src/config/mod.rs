//! Engine configuration
//!
//! Three tiers, following the usual progression:
//! - Preset: `EngineConfig::from_preset(Preset::Fast)`
//! - Builder overrides: `EngineConfig::default().sequence_depth(6)`
//! - YAML: `EngineConfig::from_yaml("audit.yaml")?`
//!
//! Every config is validated (`Validatable`) before a run starts.

pub mod engine_config;
pub mod error;
pub mod io;
pub mod preset;
pub mod validation;

pub use engine_config::EngineConfig;
pub use error::{ConfigError, ConfigResult};
pub use io::{load_input, parse_input, ConfigFile, ConfigOverrides};
pub use preset::Preset;
pub use validation::Validatable;

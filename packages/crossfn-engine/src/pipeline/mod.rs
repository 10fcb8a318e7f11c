//! Analysis pipeline
//!
//! Plans independent units of work, runs them on a dedicated rayon pool and
//! merges their outputs into one [`AnalysisReport`].
//!
//! # Usage
//! ```rust,ignore
//! use crossfn_engine::config::EngineConfig;
//! use crossfn_engine::pipeline::AnalysisEngine;
//!
//! let engine = AnalysisEngine::new(EngineConfig::default())?;
//! let report = engine.run(&input)?;
//! println!("{}", report.to_json()?);
//! ```

pub mod orchestrator;
pub mod report;
pub mod units;

pub use orchestrator::AnalysisEngine;
pub use report::AnalysisReport;
pub use units::AnalysisUnit;

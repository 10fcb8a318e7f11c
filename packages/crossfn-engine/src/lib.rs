/*
 * Crossfn Engine - Cross-function interaction analysis
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Program model, findings, diagnostics, unit budget
 * - features/    : Vertical slices (dependency graph → windows → composition → taint → aggregation)
 * - pipeline/    : Parallel orchestration and the run report
 * - config/      : Presets, validation, YAML loading
 *
 * Every unit of work is read-only over the model and the dependency graph,
 * so units run on a rayon pool without locks and merge at one barrier.
 */

#![allow(clippy::too_many_arguments)] // Analyzer entry points take the shared context pieces
#![allow(clippy::type_complexity)] // Grouping maps keyed on tuples
#![allow(clippy::new_without_default)] // Default impl not always needed

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and utilities
pub mod shared;

/// Feature modules (graph, windows, composition, taint, aggregation, triage)
pub mod features;

/// Pipeline orchestration
pub mod pipeline;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{EngineConfig, Preset};
pub use errors::{EngineError, Result};
pub use pipeline::{AnalysisEngine, AnalysisReport};
pub use shared::models::{AnalysisInput, Diagnostic, Finding, FindingCategory};

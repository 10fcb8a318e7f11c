//! Parallel analysis orchestrator
//!
//! ```text
//! AnalysisInput
//!   │ derive invariants, validate, build dependency graph    (sequential)
//!   ▼
//! Phase A: windows + taint units                            (rayon, per function)
//!   │ window reports feed the interleaving units
//!   ▼
//! Phase B: pair / interleaving / amplification / sequence   (rayon, per unit)
//!   │ single barrier
//!   ▼
//! Aggregator -> AnalysisReport
//! ```
//!
//! Units only read the model and the graph; each one owns its budget and its
//! output, so nothing is shared mutably across workers. `par_iter().collect()`
//! keeps plan order, and the aggregator sorts anyway.

use super::report::AnalysisReport;
use super::units::{self, AnalysisUnit};
use crate::config::{EngineConfig, Validatable};
use crate::errors::{EngineError, Result};
use crate::features::accounting_taint::AccountingTaintDetector;
use crate::features::aggregation::{Aggregator, UnitOutput};
use crate::features::composition::{
    amplification, commutativity, derive_invariants, interleaving, poisoning, sequence_search,
    CompositionContext,
};
use crate::features::dependency_graph::{DependencyGraph, DependencyGraphBuilder};
use crate::features::triage::{triage_entrypoints, TriageEntry, DEFAULT_TRIAGE_LIMIT};
use crate::features::window_analysis::{WindowAnalyzer, WindowReport};
use crate::shared::budget::{BudgetExhausted, UnitBudget};
use crate::shared::models::{AnalysisInput, Diagnostic, FunctionId, Invariant, ModelIndex};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct AnalysisEngine {
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl AnalysisEngine {
    /// Engine with a dedicated pool sized at 75% of the available cores
    pub fn new(config: EngineConfig) -> Result<Self> {
        let num_cpus = num_cpus::get();
        let threads = std::cmp::max(1, (num_cpus * 3) / 4);
        Self::with_threads(config, threads)
    }

    pub fn with_threads(config: EngineConfig, threads: usize) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("crossfn-worker-{}", i))
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;
        debug!("worker pool: {} threads", pool.current_num_threads());
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Explicit invariants followed by the ones lifted from storage-only guards
    pub fn invariants(&self, input: &AnalysisInput) -> Vec<Invariant> {
        let mut invariants = input.invariants.clone();
        invariants.extend(derive_invariants(&input.model, &input.invariants));
        invariants
    }

    /// Validate the model and build its dependency graph
    pub fn build_graph(&self, input: &AnalysisInput, invariants: &[Invariant]) -> Result<DependencyGraph> {
        DependencyGraphBuilder::new(&self.config).build(input, invariants)
    }

    /// Entry-point ranking without running the analyses
    pub fn triage(&self, input: &AnalysisInput, permissionless_only: bool, limit: usize) -> Result<Vec<TriageEntry>> {
        let graph = self.build_graph(input, &input.invariants)?;
        Ok(triage_entrypoints(&input.model, &graph, permissionless_only, limit))
    }

    /// Full run
    pub fn run(&self, input: &AnalysisInput) -> Result<AnalysisReport> {
        let started = Instant::now();
        let invariants = self.invariants(input);
        let graph = self.build_graph(input, &invariants)?;
        let index = input.model.index();
        info!(
            "analysis started: {} functions, {} invariants ({} derived)",
            input.model.functions().count(),
            invariants.len(),
            invariants.len() - input.invariants.len()
        );

        // Phase A
        let independent = units::plan_independent(&index);
        let phase_a: Vec<(UnitOutput, Option<WindowReport>)> = self.pool.install(|| {
            independent
                .par_iter()
                .map(|unit| self.run_independent(unit, &index, &graph))
                .collect()
        });

        let mut outputs = Vec::with_capacity(phase_a.len());
        let mut reports: BTreeMap<FunctionId, WindowReport> = BTreeMap::new();
        for (output, report) in phase_a {
            outputs.push(output);
            if let Some(report) = report {
                reports.insert(report.function.clone(), report);
            }
        }
        let with_windows: Vec<FunctionId> = reports
            .values()
            .filter(|r| r.windows.iter().any(|w| !w.pending.is_empty()))
            .map(|r| r.function.clone())
            .collect();

        // Phase B
        let ctx = CompositionContext::new(&index, &graph, input, &self.config);
        let by_name: BTreeMap<&str, &Invariant> =
            invariants.iter().map(|i| (i.name.as_str(), i)).collect();
        let composition = units::plan_composition(&index, &graph, &invariants, &with_windows);
        debug!(
            "phase A: {} units; phase B: {} units",
            independent.len(),
            composition.len()
        );
        let phase_b: Vec<UnitOutput> = self.pool.install(|| {
            composition
                .par_iter()
                .map(|unit| self.run_composition(unit, &ctx, &reports, &by_name))
                .collect()
        });
        outputs.extend(phase_b);

        let (findings, mut summary) = Aggregator::new().aggregate(&outputs);
        summary.diagnostics.extend(graph.diagnostics.iter().cloned());
        summary.diagnostics.sort();
        summary.diagnostics.dedup();

        let triage = triage_entrypoints(&input.model, &graph, false, DEFAULT_TRIAGE_LIMIT);

        info!(
            "analysis finished in {:.2?}: {} findings, {}/{} units complete",
            started.elapsed(),
            summary.total_findings,
            summary.units_completed,
            summary.units_total
        );
        Ok(AnalysisReport {
            findings,
            summary,
            triage,
        })
    }

    fn budget(&self) -> UnitBudget {
        UnitBudget::new(self.config.unit_step_budget, self.config.unit_time_budget())
    }

    /// Run `body` under a fresh budget; exhaustion marks the unit incomplete
    fn execute<F>(&self, unit: &AnalysisUnit, body: F) -> UnitOutput
    where
        F: FnOnce(&mut UnitBudget, &mut UnitOutput) -> std::result::Result<(), BudgetExhausted>,
    {
        let name = unit.to_string();
        let mut budget = self.budget();
        let mut output = UnitOutput::new(name.clone());
        if let Err(exhausted) = body(&mut budget, &mut output) {
            warn!("unit {} cancelled: {}", name, exhausted);
            output.incomplete = true;
            for finding in &mut output.findings {
                finding.incomplete = true;
            }
            output.diagnostics.push(Diagnostic::BudgetExceeded {
                unit: name.clone(),
                steps: exhausted.steps,
                elapsed_ms: exhausted.elapsed_ms,
            });
        }
        debug!(
            "unit {} finished: {} findings, {} diagnostics",
            name,
            output.findings.len(),
            output.diagnostics.len()
        );
        output
    }

    fn run_independent(
        &self,
        unit: &AnalysisUnit,
        index: &ModelIndex<'_>,
        graph: &DependencyGraph,
    ) -> (UnitOutput, Option<WindowReport>) {
        let mut report = None;
        let output = self.execute(unit, |budget, out| {
            match unit {
                AnalysisUnit::Windows(id) => {
                    if let Some(function) = index.function(id) {
                        let outcome = WindowAnalyzer::new(index, graph, &self.config).analyze(function, budget);
                        out.findings.extend(outcome.findings);
                        out.diagnostics.extend(outcome.diagnostics);
                        out.incomplete = outcome.incomplete;
                        report = Some(outcome.report);
                    }
                }
                AnalysisUnit::Taint(id) => {
                    if let Some(function) = index.function(id) {
                        out.findings
                            .extend(AccountingTaintDetector::new(index, graph, &self.config).detect(function));
                    }
                }
                other => warn!("unit {} is not independent", other),
            }
            Ok(())
        });
        (output, report)
    }

    fn run_composition(
        &self,
        unit: &AnalysisUnit,
        ctx: &CompositionContext<'_>,
        reports: &BTreeMap<FunctionId, WindowReport>,
        invariants: &BTreeMap<&str, &Invariant>,
    ) -> UnitOutput {
        self.execute(unit, |budget, out| {
            match unit {
                AnalysisUnit::Pair(first, second) => {
                    let (Some(a), Some(b)) = (ctx.function(first), ctx.function(second)) else {
                        return Ok(());
                    };
                    if !a.view && !b.view {
                        if let Some(finding) = commutativity::check_pair(ctx, a, b, budget, &mut out.diagnostics)? {
                            out.findings.push(finding);
                        }
                    }
                    for (x, y) in [(a, b), (b, a)] {
                        if poisoning::is_candidate(ctx, x, y) {
                            if let Some(finding) = poisoning::check_pair(ctx, x, y, budget)? {
                                out.findings.push(finding);
                            }
                        }
                    }
                }
                AnalysisUnit::Interleaving(id) => {
                    if let (Some(function), Some(report)) = (ctx.function(id), reports.get(id)) {
                        out.findings
                            .extend(interleaving::check_function(ctx, function, report, budget)?);
                    }
                }
                AnalysisUnit::Amplification(id) => {
                    if let Some(function) = ctx.function(id) {
                        out.findings
                            .extend(amplification::check_function(ctx, function, budget)?);
                    }
                }
                AnalysisUnit::Sequence(name) => {
                    if let Some(invariant) = invariants.get(name.as_str()) {
                        if let Some(finding) = sequence_search::search(ctx, invariant, budget, &mut out.diagnostics)? {
                            out.findings.push(finding);
                        }
                    }
                }
                other => warn!("unit {} is not a composition unit", other),
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{FindingCategory, ProgramModel};

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig::default().sequence_depth(0);
        assert!(matches!(
            AnalysisEngine::with_threads(config, 1),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_empty_model_reports_every_category() {
        let engine = AnalysisEngine::with_threads(EngineConfig::default(), 1).unwrap();
        let report = engine.run(&AnalysisInput::new(ProgramModel::default())).unwrap();
        assert!(report.findings.is_empty());
        assert_eq!(report.summary.units_total, 0);
        assert_eq!(report.summary.counts.len(), FindingCategory::ALL.len());
        assert!(report.summary.is_complete());
    }
}

//! Window analyzer
//!
//! For every trace of a function: a forward scan accumulates `Updated`, a
//! backward scan accumulates `Pending` (every later write, opaque steps
//! included), and each external call snapshots both. View functions whose
//! reads intersect `Pending` are recorded on the window and turned into
//! `stale-data` findings, one per (anchor, view) pair.

use super::trace_enumerator::TraceEnumerator;
use crate::config::EngineConfig;
use crate::features::aggregation::scoring;
use crate::features::dependency_graph::DependencyGraph;
use crate::features::window_analysis::domain::{
    ExecutionWindow, StaleView, StepKind, Trace, WindowReport,
};
use crate::shared::budget::UnitBudget;
use crate::shared::models::{
    ArgValue, CallArg, Diagnostic, Finding, FindingCategory, Function, FunctionId, ModelIndex,
    OpRef, VarId, WitnessCall,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Windows, stale-data findings and diagnostics of one function
#[derive(Debug, Clone)]
pub struct WindowOutcome {
    pub report: WindowReport,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub incomplete: bool,
}

pub struct WindowAnalyzer<'a> {
    index: &'a ModelIndex<'a>,
    graph: &'a DependencyGraph,
    config: &'a EngineConfig,
}

impl<'a> WindowAnalyzer<'a> {
    pub fn new(index: &'a ModelIndex<'a>, graph: &'a DependencyGraph, config: &'a EngineConfig) -> Self {
        Self {
            index,
            graph,
            config,
        }
    }

    /// Full analysis of one function
    pub fn analyze(&self, function: &'a Function, budget: &mut UnitBudget) -> WindowOutcome {
        let mut enumerator = TraceEnumerator::new(
            self.index,
            &self.graph.call_graph,
            self.config.inline_depth,
            self.config.max_traces,
        );
        let set = enumerator.enumerate(function, budget);

        let mut diagnostics = Vec::new();
        if set.overflow {
            diagnostics.push(Diagnostic::TraceOverflow {
                function: function.id.clone(),
                bound: self.config.max_traces,
            });
        }
        if set.truncated {
            diagnostics.push(Diagnostic::BudgetExceeded {
                unit: format!("windows:{}", function.id),
                steps: budget.steps(),
                elapsed_ms: budget.elapsed().as_millis() as u64,
            });
        }

        let views = self.views_for(function);
        let mut windows = Vec::new();
        for (trace_index, trace) in set.traces.iter().enumerate() {
            windows.extend(compute_windows(
                &function.id,
                trace_index,
                trace,
                &views,
                self.graph,
            ));
        }

        let report = WindowReport {
            function: function.id.clone(),
            traces: set.traces.len(),
            overflow: set.overflow,
            windows,
        };
        let findings = self.stale_data_findings(function, &report, set.truncated);
        debug!(
            "{}: {} traces, {} windows, {} stale-data findings",
            function.id,
            report.traces,
            report.windows.len(),
            findings.len()
        );

        WindowOutcome {
            report,
            findings,
            diagnostics,
            incomplete: set.truncated,
        }
    }

    /// Externally observable read functions that may run inside a window of
    /// `function`
    fn views_for(&self, function: &Function) -> Vec<&'a Function> {
        self.index
            .model
            .functions()
            .filter(|v| v.view && v.is_entrypoint() && v.id != function.id)
            .filter(|v| !v.shares_guard_with(function))
            .collect()
    }

    fn stale_data_findings(
        &self,
        function: &Function,
        report: &WindowReport,
        incomplete: bool,
    ) -> Vec<Finding> {
        // (anchor, view) -> (stale vars, updated vars, callback)
        let mut grouped: BTreeMap<(OpRef, FunctionId), (BTreeSet<VarId>, BTreeSet<VarId>, Option<OpRef>)> =
            BTreeMap::new();
        for window in &report.windows {
            for stale in &window.stale_views {
                let entry = grouped
                    .entry((window.anchor.clone(), stale.view.clone()))
                    .or_default();
                entry.0.extend(stale.variables.iter().cloned());
                entry.1.extend(window.updated.iter().cloned());
                if entry.2.is_none() {
                    entry.2 = window.callback.clone();
                }
            }
        }

        grouped
            .into_iter()
            .map(|((anchor, view), (stale, updated, callback))| {
                let sensitivity = scoring::max_sensitivity(self.index, stale.iter());
                let stale_list = join(&stale);
                let mut builder = Finding::builder(
                    FindingCategory::StaleData,
                    function.contract.clone(),
                    function.id.clone(),
                )
                .title(format!(
                    "{} reads pending {} during the external call at {}",
                    view.short_name(),
                    stale_list,
                    anchor
                ))
                .function(view.clone())
                .variables(stale.iter())
                .operation(anchor.clone())
                .severity(scoring::score(FindingCategory::StaleData, sensitivity))
                .sequence(vec![
                    placeholder_call(function),
                    self.index
                        .function(&view)
                        .map(placeholder_call)
                        .unwrap_or_else(|| WitnessCall::new(view.clone(), Vec::new())),
                ])
                .evidence(format!("external call at {} opens the window", anchor))
                .evidence(format!("{} is written after the call", stale_list))
                .detail("view", &view)
                .detail("pending", stale_list.clone())
                .detail("updated", join(&updated))
                .incomplete(incomplete);
                if let Some(callback) = callback {
                    builder = builder
                        .operation(callback.clone())
                        .detail("callback", callback);
                }
                builder.build()
            })
            .collect()
    }
}

/// Windows of one trace
pub fn compute_windows(
    function: &FunctionId,
    trace_index: usize,
    trace: &Trace,
    views: &[&Function],
    graph: &DependencyGraph,
) -> Vec<ExecutionWindow> {
    let steps = &trace.steps;

    // pending_after[i]: writes that may happen strictly after step i
    let mut pending_after = vec![BTreeSet::new(); steps.len()];
    let mut acc: BTreeSet<VarId> = BTreeSet::new();
    for i in (0..steps.len()).rev() {
        pending_after[i] = acc.clone();
        match &steps[i].kind {
            StepKind::Write(var) => {
                acc.insert(var.clone());
            }
            StepKind::Opaque { may_write, .. } => acc.extend(may_write.iter().cloned()),
            _ => {}
        }
    }

    let mut windows = Vec::new();
    let mut updated: BTreeSet<VarId> = BTreeSet::new();
    for (i, step) in steps.iter().enumerate() {
        match &step.kind {
            StepKind::Write(var) => {
                updated.insert(var.clone());
            }
            StepKind::ExternalCall => {
                let callback = steps[i + 1..].iter().position(|s| {
                    matches!(&s.kind, StepKind::Callback { triggered_by } if *triggered_by == step.origin)
                });
                let (exit, callback) = match callback {
                    Some(offset) => (i + offset + 2, Some(steps[i + 1 + offset].origin.clone())),
                    None => (i + 1, None),
                };

                let pending = pending_after[i].clone();
                let stale_views = views
                    .iter()
                    .filter_map(|view| {
                        let reads = &graph.footprint(&view.id)?.reads;
                        let variables: BTreeSet<VarId> =
                            reads.intersection(&pending).cloned().collect();
                        (!variables.is_empty()).then(|| StaleView {
                            view: view.id.clone(),
                            variables,
                        })
                    })
                    .collect();

                windows.push(ExecutionWindow {
                    function: function.clone(),
                    trace: trace_index,
                    anchor: step.origin.clone(),
                    callback,
                    entry: i,
                    exit,
                    updated: updated.clone(),
                    pending,
                    stale_views,
                });
            }
            _ => {}
        }
    }
    windows
}

fn placeholder_call(function: &Function) -> WitnessCall {
    WitnessCall::new(
        function.id.clone(),
        function
            .params
            .iter()
            .map(|p| CallArg {
                name: p.name.clone(),
                value: ArgValue::Placeholder("any".to_string()),
            })
            .collect(),
    )
}

fn join(vars: &BTreeSet<VarId>) -> String {
    vars.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

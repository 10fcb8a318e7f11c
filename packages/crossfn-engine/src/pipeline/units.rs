//! Units of work
//!
//! Every unit is independent and read-only over the model and the dependency
//! graph. Planning order is deterministic; pair units follow coupling
//! strength so the strongest interactions are tested first.

use crate::features::dependency_graph::DependencyGraph;
use crate::shared::models::{FunctionId, Invariant, ModelIndex};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnalysisUnit {
    /// Execution windows and stale-data of one function
    Windows(FunctionId),
    /// Accounting taint of one function
    Taint(FunctionId),
    /// Commutativity and poisoning of one coupled pair
    Pair(FunctionId, FunctionId),
    /// Interleaving inside the windows of one function
    Interleaving(FunctionId),
    /// Rounding amplification of one amount-taking function
    Amplification(FunctionId),
    /// Invariant-sequence search for one invariant
    Sequence(String),
}

impl AnalysisUnit {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisUnit::Windows(_) => "windows",
            AnalysisUnit::Taint(_) => "taint",
            AnalysisUnit::Pair(..) => "pair",
            AnalysisUnit::Interleaving(_) => "interleaving",
            AnalysisUnit::Amplification(_) => "amplification",
            AnalysisUnit::Sequence(_) => "sequence",
        }
    }
}

impl fmt::Display for AnalysisUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisUnit::Windows(id)
            | AnalysisUnit::Taint(id)
            | AnalysisUnit::Interleaving(id)
            | AnalysisUnit::Amplification(id) => write!(f, "{}:{}", self.kind(), id),
            AnalysisUnit::Pair(a, b) => write!(f, "pair:{}+{}", a, b),
            AnalysisUnit::Sequence(name) => write!(f, "sequence:{}", name),
        }
    }
}

/// Units that only need the model and the graph
pub fn plan_independent(index: &ModelIndex<'_>) -> Vec<AnalysisUnit> {
    let mut units = Vec::new();
    for function in index.model.functions().filter(|f| f.is_entrypoint()) {
        units.push(AnalysisUnit::Windows(function.id.clone()));
    }
    for function in index.model.functions() {
        if !function.view && function.is_attacker_callable(index.roles()) {
            units.push(AnalysisUnit::Taint(function.id.clone()));
        }
    }
    units
}

/// Composition units; `with_windows` lists functions with at least one
/// window that leaves writes pending
pub fn plan_composition(
    index: &ModelIndex<'_>,
    graph: &DependencyGraph,
    invariants: &[Invariant],
    with_windows: &[FunctionId],
) -> Vec<AnalysisUnit> {
    let mut units: Vec<AnalysisUnit> = graph
        .couplings
        .iter()
        .map(|c| AnalysisUnit::Pair(c.first.clone(), c.second.clone()))
        .collect();

    units.extend(with_windows.iter().cloned().map(AnalysisUnit::Interleaving));

    for function in index.model.functions() {
        if function.is_entrypoint() && !function.view && function.params.iter().any(|p| p.is_amount) {
            units.push(AnalysisUnit::Amplification(function.id.clone()));
        }
    }

    units.extend(invariants.iter().map(|i| AnalysisUnit::Sequence(i.name.clone())));
    units
}

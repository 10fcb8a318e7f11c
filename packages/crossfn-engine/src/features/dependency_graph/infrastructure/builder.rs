//! Dependency graph builder
//!
//! Pass 1 visits every operation of every function exactly once and records
//! `StorageRead`/`StorageWrite` in the writer/reader relation. Pass 2 computes
//! per-function footprints with internal calls inlined up to the configured
//! depth; opaque calls widen the footprint instead of shrinking it. Pass 3
//! derives couplings and invariant movers from the footprints.

use super::call_graph::{widening_set, CallResolution, InternalCallGraph};
use super::validator::ModelValidator;
use crate::config::EngineConfig;
use crate::errors::Result;
use crate::features::dependency_graph::domain::{
    Coupling, DependencyGraph, Footprint, InvariantTerms, VarRelations,
};
use crate::shared::models::{
    walk_body, AnalysisInput, Diagnostic, Function, FunctionId, Invariant, ModelIndex, OpPath,
    OpRef, Operation, VarId,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub struct DependencyGraphBuilder<'c> {
    config: &'c EngineConfig,
}

impl<'c> DependencyGraphBuilder<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Validate the input and build the graph.
    ///
    /// `invariants` is the full invariant set (explicit and derived).
    pub fn build(&self, input: &AnalysisInput, invariants: &[Invariant]) -> Result<DependencyGraph> {
        ModelValidator::validate(input)?;

        let model = &input.model;
        let index = model.index();
        let call_graph = InternalCallGraph::build(model);

        let relations = build_relations(&index);

        let mut diagnostics = BTreeSet::new();
        for (caller, callee) in call_graph.recursive_edges() {
            diagnostics.insert(Diagnostic::RecursiveCall {
                caller: caller.clone(),
                callee: callee.clone(),
            });
        }

        let mut footprints = BTreeMap::new();
        for function in model.functions() {
            let mut collector = FootprintCollector {
                index: &index,
                call_graph: &call_graph,
                max_depth: self.config.inline_depth,
                root: function,
                footprint: Footprint::default(),
                diagnostics: &mut diagnostics,
            };
            collector.collect(function, 0);
            let mut footprint = collector.footprint;
            footprint.internal_calls = count_internal_calls(function);
            footprints.insert(function.id.clone(), footprint);
        }

        let couplings = build_couplings(&index, &footprints);
        let invariant_terms = build_invariant_terms(&index, invariants, &footprints);

        info!(
            "dependency graph: {} variables, {} functions, {} couplings, {} diagnostics",
            relations.len(),
            footprints.len(),
            couplings.len(),
            diagnostics.len()
        );

        Ok(DependencyGraph {
            relations,
            footprints,
            couplings,
            invariant_terms,
            call_graph,
            diagnostics: diagnostics.into_iter().collect(),
        })
    }
}

/// Writer/reader relation; one entry per storage operation.
fn build_relations(index: &ModelIndex<'_>) -> BTreeMap<VarId, VarRelations> {
    let mut relations: BTreeMap<VarId, VarRelations> = index
        .model
        .variables()
        .map(|v| (v.id.clone(), VarRelations::default()))
        .collect();

    for function in index.model.functions() {
        walk_body(&function.body, &mut |path, op| match op {
            Operation::StorageRead { var, .. } => {
                relations
                    .entry(var.clone())
                    .or_default()
                    .readers
                    .insert(OpRef::new(function.id.clone(), path.clone()));
            }
            Operation::StorageWrite { var, .. } => {
                relations
                    .entry(var.clone())
                    .or_default()
                    .writers
                    .insert(OpRef::new(function.id.clone(), path.clone()));
            }
            _ => {}
        });
    }
    relations
}

fn count_internal_calls(function: &Function) -> usize {
    let mut count = 0;
    walk_body(&function.body, &mut |_, op| {
        if matches!(op, Operation::InternalCall { .. }) {
            count += 1;
        }
    });
    count
}

struct FootprintCollector<'a, 'd> {
    index: &'a ModelIndex<'a>,
    call_graph: &'a InternalCallGraph,
    max_depth: usize,
    root: &'a Function,
    footprint: Footprint,
    diagnostics: &'d mut BTreeSet<Diagnostic>,
}

impl<'a, 'd> FootprintCollector<'a, 'd> {
    fn collect(&mut self, function: &'a Function, depth: usize) {
        let mut calls: Vec<(OpPath, &'a FunctionId)> = Vec::new();
        walk_body(&function.body, &mut |path, op| match op {
            Operation::StorageRead { var, .. } => {
                self.footprint.reads.insert(var.clone());
            }
            Operation::StorageWrite { var, .. } => {
                self.footprint.writes.insert(var.clone());
            }
            Operation::ExternalCall { .. } => self.footprint.external_calls += 1,
            Operation::InternalCall { callee, .. } => calls.push((path.clone(), callee)),
            _ => {}
        });

        for (path, callee) in calls {
            match self
                .call_graph
                .resolve(self.index, function, callee, depth, self.max_depth)
            {
                CallResolution::Inline(target) => self.collect(target, depth + 1),
                CallResolution::Recursive => {
                    self.widen(callee);
                }
                CallResolution::Unresolved(reason) => {
                    debug!(
                        "{}: call {}@{} -> {} unresolved ({:?})",
                        self.root.id, function.id, path, callee, reason
                    );
                    self.diagnostics.insert(Diagnostic::UnresolvedInternalCall {
                        caller: function.id.clone(),
                        callee: callee.clone(),
                        op: path,
                        reason,
                    });
                    self.widen(callee);
                }
            }
        }
    }

    fn widen(&mut self, callee: &FunctionId) {
        let vars = widening_set(self.index, &self.root.contract, callee);
        self.footprint.reads.extend(vars.iter().cloned());
        self.footprint.writes.extend(vars);
        self.footprint.widened = true;
    }
}

/// Pairwise couplings between entry points, strongest first.
fn build_couplings(
    index: &ModelIndex<'_>,
    footprints: &BTreeMap<FunctionId, Footprint>,
) -> Vec<Coupling> {
    let entrypoints: Vec<(&FunctionId, &Footprint)> = footprints
        .iter()
        .filter(|(id, _)| index.function(id).is_some_and(|f| f.is_entrypoint()))
        .collect();

    let mut couplings = Vec::new();
    for (i, (first, fa)) in entrypoints.iter().enumerate() {
        for (second, fb) in &entrypoints[i + 1..] {
            let shared: BTreeSet<VarId> = fa
                .touches()
                .intersection(&fb.touches())
                .filter(|var| fa.writes.contains(**var) || fb.writes.contains(**var))
                .map(|var| (*var).clone())
                .collect();
            if !shared.is_empty() {
                couplings.push(Coupling {
                    first: (*first).clone(),
                    second: (*second).clone(),
                    shared,
                });
            }
        }
    }

    couplings.sort_by(|a, b| {
        b.strength()
            .cmp(&a.strength())
            .then_with(|| a.first.cmp(&b.first))
            .then_with(|| a.second.cmp(&b.second))
    });
    couplings
}

fn build_invariant_terms(
    index: &ModelIndex<'_>,
    invariants: &[Invariant],
    footprints: &BTreeMap<FunctionId, Footprint>,
) -> BTreeMap<String, InvariantTerms> {
    invariants
        .iter()
        .map(|invariant| {
            let terms = invariant.terms();
            let movers = footprints
                .iter()
                .filter(|(id, fp)| {
                    index.function(id).is_some_and(|f| f.is_entrypoint() && !f.view)
                        && fp.writes.iter().any(|w| terms.contains(w))
                })
                .map(|(id, _)| id.clone())
                .collect();
            (invariant.name.clone(), InvariantTerms { terms, movers })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use crate::shared::models::{
        AccessControl, Contract, ProgramModel, StorageVariable, ValueExpr,
    };

    fn var(name: &str) -> StorageVariable {
        StorageVariable {
            id: format!("C.{}", name).into(),
            contract: "C".into(),
            slot: String::new(),
            ty: Default::default(),
            sensitivity: Default::default(),
        }
    }

    fn function(name: &str, body: Vec<Operation>) -> Function {
        Function {
            id: format!("C.{}", name).into(),
            contract: "C".into(),
            access: AccessControl::Unrestricted,
            external: true,
            view: false,
            reentrancy_guard: None,
            params: vec![],
            preconditions: vec![],
            body,
        }
    }

    fn read(v: &str) -> Operation {
        Operation::StorageRead {
            var: format!("C.{}", v).into(),
            bind: None,
        }
    }

    fn write(v: &str) -> Operation {
        Operation::StorageWrite {
            var: format!("C.{}", v).into(),
            value: ValueExpr::constant(1),
        }
    }

    fn call(callee: &str) -> Operation {
        Operation::InternalCall {
            callee: format!("C.{}", callee).into(),
            args: vec![],
            returns: None,
        }
    }

    fn input(functions: Vec<Function>, vars: &[&str]) -> AnalysisInput {
        AnalysisInput::new(ProgramModel {
            contracts: vec![Contract {
                id: "C".into(),
                functions,
                variables: vars.iter().map(|v| var(v)).collect(),
            }],
            roles: vec![],
        })
    }

    #[test]
    fn test_relations_and_inlined_footprint() {
        let mut helper = function("_hook", vec![write("b")]);
        helper.access = AccessControl::InternalOnly;
        let input = input(
            vec![function("f", vec![read("a"), call("_hook")]), helper],
            &["a", "b"],
        );
        let config = EngineConfig::default();
        let graph = DependencyGraphBuilder::new(&config).build(&input, &[]).unwrap();

        assert_eq!(graph.access_count(), 2);
        let fp = graph.footprint(&"C.f".into()).unwrap();
        assert!(fp.reads.contains(&VarId::from("C.a")));
        assert!(fp.writes.contains(&VarId::from("C.b")));
        assert!(!fp.widened);
    }

    #[test]
    fn test_depth_cutoff_widens_and_reports() {
        let input = input(
            vec![
                function("f", vec![call("g")]),
                function("g", vec![call("h")]),
                function("h", vec![write("b")]),
            ],
            &["a", "b"],
        );
        let config = EngineConfig::default().inline_depth(1);
        let graph = DependencyGraphBuilder::new(&config).build(&input, &[]).unwrap();

        let fp = graph.footprint(&"C.f".into()).unwrap();
        assert!(fp.widened);
        assert!(fp.writes.contains(&VarId::from("C.a")));
        assert!(graph
            .diagnostics
            .iter()
            .any(|d| d.kind() == "unresolved-internal-call"));
    }

    #[test]
    fn test_undeclared_variable_is_fatal() {
        let input = input(vec![function("f", vec![write("ghost")])], &["a"]);
        let config = EngineConfig::default();
        let err = DependencyGraphBuilder::new(&config)
            .build(&input, &[])
            .unwrap_err();
        match err {
            EngineError::ModelInconsistency { reference, .. } => assert_eq!(reference, "C.ghost"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_couplings_sorted_by_strength() {
        let input = input(
            vec![
                function("f", vec![write("a"), write("b")]),
                function("g", vec![read("a"), read("b")]),
                function("h", vec![read("a")]),
            ],
            &["a", "b"],
        );
        let config = EngineConfig::default();
        let graph = DependencyGraphBuilder::new(&config).build(&input, &[]).unwrap();
        let strengths: Vec<usize> = graph.couplings.iter().map(|c| c.strength()).collect();
        assert_eq!(strengths, vec![2, 1]);
        // g and h only read: not coupled
        assert!(!graph
            .couplings
            .iter()
            .any(|c| c.involves(&"C.g".into()) && c.involves(&"C.h".into())));
    }
}

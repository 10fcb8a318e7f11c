//! Internal call graph with petgraph
//!
//! Nodes are functions, edges are `InternalCall` operations. Tarjan SCC marks
//! every edge inside a cycle as recursive; such edges are never inlined.

use crate::shared::models::{
    walk_body, ContractId, Function, FunctionId, ModelIndex, Operation, ProgramModel,
    UnresolvedReason, VarId,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// How an internal call is handled at a given inlining depth
#[derive(Debug, Clone, Copy)]
pub enum CallResolution<'a> {
    Inline(&'a Function),
    Recursive,
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, Default)]
pub struct InternalCallGraph {
    graph: DiGraph<FunctionId, ()>,
    nodes: FxHashMap<FunctionId, NodeIndex>,
    recursive_edges: BTreeSet<(FunctionId, FunctionId)>,
}

impl InternalCallGraph {
    /// Build from a validated model (every callee exists)
    pub fn build(model: &ProgramModel) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = FxHashMap::default();

        for function in model.functions() {
            let idx = graph.add_node(function.id.clone());
            nodes.insert(function.id.clone(), idx);
        }

        for function in model.functions() {
            let Some(&from) = nodes.get(&function.id) else {
                continue;
            };
            walk_body(&function.body, &mut |_, op| {
                if let Operation::InternalCall { callee, .. } = op {
                    if let Some(&to) = nodes.get(callee) {
                        graph.update_edge(from, to, ());
                    }
                }
            });
        }

        let mut recursive_edges = BTreeSet::new();
        for scc in tarjan_scc(&graph) {
            let members: BTreeSet<NodeIndex> = scc.iter().copied().collect();
            for &node in &scc {
                for next in graph.neighbors(node) {
                    // Self-loops are single-node SCCs
                    if members.contains(&next) && (scc.len() > 1 || next == node) {
                        recursive_edges.insert((graph[node].clone(), graph[next].clone()));
                    }
                }
            }
        }

        Self {
            graph,
            nodes,
            recursive_edges,
        }
    }

    pub fn is_recursive(&self, caller: &FunctionId, callee: &FunctionId) -> bool {
        self.recursive_edges
            .contains(&(caller.clone(), callee.clone()))
    }

    pub fn recursive_edges(&self) -> impl Iterator<Item = &(FunctionId, FunctionId)> {
        self.recursive_edges.iter()
    }

    /// Direct callees of `function`
    pub fn callees(&self, function: &FunctionId) -> Vec<&FunctionId> {
        let Some(&idx) = self.nodes.get(function) else {
            return Vec::new();
        };
        let mut out: Vec<&FunctionId> = self.graph.neighbors(idx).map(|n| &self.graph[n]).collect();
        out.sort();
        out
    }

    /// Decide whether the call `caller -> callee` is inlined when the caller
    /// runs at inlining depth `depth`.
    pub fn resolve<'a>(
        &self,
        index: &ModelIndex<'a>,
        caller: &Function,
        callee: &FunctionId,
        depth: usize,
        max_depth: usize,
    ) -> CallResolution<'a> {
        let Some(target) = index.function(callee) else {
            return CallResolution::Unresolved(UnresolvedReason::CrossContract);
        };
        if target.contract != caller.contract {
            return CallResolution::Unresolved(UnresolvedReason::CrossContract);
        }
        if self.is_recursive(&caller.id, callee) {
            return CallResolution::Recursive;
        }
        if depth + 1 > max_depth {
            return CallResolution::Unresolved(UnresolvedReason::DepthExceeded);
        }
        CallResolution::Inline(target)
    }
}

/// Variables an opaque call may touch: everything declared by the root
/// function's contract and by the callee's contract.
pub fn widening_set(index: &ModelIndex<'_>, root: &ContractId, callee: &FunctionId) -> BTreeSet<VarId> {
    let mut vars: BTreeSet<VarId> = index.contract_variables(root).cloned().collect();
    if let Some(target) = index.function(callee) {
        vars.extend(index.contract_variables(&target.contract).cloned());
    }
    vars
}

//! Dependency graph domain models

use crate::shared::models::{Diagnostic, FunctionId, OpRef, VarId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::infrastructure::call_graph::InternalCallGraph;

/// Writer/reader sets of one storage variable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarRelations {
    pub writers: BTreeSet<OpRef>,
    pub readers: BTreeSet<OpRef>,
}

impl VarRelations {
    pub fn writer_functions(&self) -> BTreeSet<&FunctionId> {
        self.writers.iter().map(|r| &r.function).collect()
    }

    pub fn reader_functions(&self) -> BTreeSet<&FunctionId> {
        self.readers.iter().map(|r| &r.function).collect()
    }
}

/// Storage touched by a function, internal calls inlined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub reads: BTreeSet<VarId>,
    pub writes: BTreeSet<VarId>,

    /// Some call was opaque and the sets were widened
    pub widened: bool,

    /// External calls reachable from the function body
    pub external_calls: usize,

    /// Internal calls in the function's own body
    pub internal_calls: usize,
}

impl Footprint {
    pub fn touches(&self) -> BTreeSet<&VarId> {
        self.reads.iter().chain(self.writes.iter()).collect()
    }
}

/// Two functions interacting through shared storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupling {
    pub first: FunctionId,
    pub second: FunctionId,
    /// Shared variables written by at least one side
    pub shared: BTreeSet<VarId>,
}

impl Coupling {
    pub fn strength(&self) -> usize {
        self.shared.len()
    }

    pub fn involves(&self, function: &FunctionId) -> bool {
        &self.first == function || &self.second == function
    }
}

/// Terms of one invariant and the functions able to move them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantTerms {
    pub terms: BTreeSet<VarId>,
    pub movers: BTreeSet<FunctionId>,
}

/// Output of the dependency graph builder
///
/// Immutable once built; shared read-only by every analysis unit.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub relations: BTreeMap<VarId, VarRelations>,
    pub footprints: BTreeMap<FunctionId, Footprint>,
    /// Sorted by strength, strongest first
    pub couplings: Vec<Coupling>,
    pub invariant_terms: BTreeMap<String, InvariantTerms>,
    pub call_graph: InternalCallGraph,
    pub diagnostics: Vec<Diagnostic>,
}

impl DependencyGraph {
    pub fn relations_of(&self, var: &VarId) -> Option<&VarRelations> {
        self.relations.get(var)
    }

    pub fn footprint(&self, function: &FunctionId) -> Option<&Footprint> {
        self.footprints.get(function)
    }

    /// Functions other than `except` reading `var` (inlined reads included)
    pub fn readers_except<'a>(
        &'a self,
        var: &'a VarId,
        except: &'a FunctionId,
    ) -> impl Iterator<Item = &'a FunctionId> + 'a {
        self.footprints
            .iter()
            .filter(move |(id, fp)| *id != except && fp.reads.contains(var))
            .map(|(id, _)| id)
    }

    /// Total entries across every writer and reader set
    pub fn access_count(&self) -> usize {
        self.relations
            .values()
            .map(|r| r.writers.len() + r.readers.len())
            .sum()
    }

    pub fn couplings_for<'a>(
        &'a self,
        function: &'a FunctionId,
    ) -> impl Iterator<Item = &'a Coupling> + 'a {
        self.couplings.iter().filter(move |c| c.involves(function))
    }
}

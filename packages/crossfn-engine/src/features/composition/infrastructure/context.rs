//! Shared read-only view handed to every composition test

use super::simulator::Simulator;
use crate::config::EngineConfig;
use crate::features::dependency_graph::DependencyGraph;
use crate::shared::models::{AnalysisInput, Function, FunctionId, ModelIndex, VarId};
use std::collections::BTreeSet;

#[derive(Clone, Copy)]
pub struct CompositionContext<'a> {
    pub index: &'a ModelIndex<'a>,
    pub graph: &'a DependencyGraph,
    pub input: &'a AnalysisInput,
    pub config: &'a EngineConfig,
}

impl<'a> CompositionContext<'a> {
    pub fn new(
        index: &'a ModelIndex<'a>,
        graph: &'a DependencyGraph,
        input: &'a AnalysisInput,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            index,
            graph,
            input,
            config,
        }
    }

    pub fn simulator(&self) -> Simulator<'a> {
        Simulator::new(self.index, &self.graph.call_graph, self.config.inline_depth)
    }

    pub fn function(&self, id: &FunctionId) -> Option<&'a Function> {
        self.index.function(id)
    }

    pub fn writes(&self, id: &FunctionId) -> BTreeSet<VarId> {
        self.graph
            .footprint(id)
            .map(|fp| fp.writes.clone())
            .unwrap_or_default()
    }

    pub fn reads(&self, id: &FunctionId) -> BTreeSet<VarId> {
        self.graph
            .footprint(id)
            .map(|fp| fp.reads.clone())
            .unwrap_or_default()
    }
}

//! Permissionless accounting detector
//!
//! Flags an attacker-callable function that writes an economic variable read
//! elsewhere, when the written value depends on an external call return that
//! no guard cross-checks against an independent source.

use super::propagator::TaintPropagator;
use crate::config::EngineConfig;
use crate::features::accounting_taint::domain::TaintSource;
use crate::features::aggregation::scoring;
use crate::features::dependency_graph::DependencyGraph;
use crate::shared::models::{Finding, FindingCategory, Function, FunctionId, ModelIndex};
use std::collections::BTreeSet;
use tracing::debug;

pub struct AccountingTaintDetector<'a> {
    index: &'a ModelIndex<'a>,
    graph: &'a DependencyGraph,
    config: &'a EngineConfig,
}

impl<'a> AccountingTaintDetector<'a> {
    pub fn new(index: &'a ModelIndex<'a>, graph: &'a DependencyGraph, config: &'a EngineConfig) -> Self {
        Self { index, graph, config }
    }

    pub fn detect(&self, function: &Function) -> Vec<Finding> {
        let Some(function) = self.index.function(&function.id) else {
            return Vec::new();
        };
        if function.view || !function.is_attacker_callable(self.index.roles()) {
            return Vec::new();
        }

        let summary =
            TaintPropagator::new(self.index, &self.graph.call_graph, self.config.inline_depth).run(function);
        let corroborated = summary.corroborated();
        if !corroborated.is_empty() {
            debug!("{}: {} corroborated sources", function.id, corroborated.len());
        }

        let mut findings = Vec::new();
        for (var, writes) in summary.uncorroborated_writes() {
            let Some(variable) = self.index.variable(var) else {
                continue;
            };
            if !variable.sensitivity.is_economic() {
                continue;
            }
            let readers: BTreeSet<&FunctionId> = self.graph.readers_except(var, &function.id).collect();
            if readers.is_empty() {
                continue;
            }

            let sources: BTreeSet<&TaintSource> = writes.iter().flat_map(|(_, open)| open.iter().copied()).collect();
            let targets: Vec<&str> = sources.iter().map(|s| s.target.as_str()).collect::<BTreeSet<_>>().into_iter().collect();

            let mut builder = Finding::builder(
                FindingCategory::PermissionlessAccounting,
                function.contract.clone(),
                function.id.clone(),
            )
            .title(format!(
                "{} sets {} from unverified {}",
                function.name(),
                var,
                targets.join(", ")
            ))
            .variables([var])
            .severity(scoring::score(FindingCategory::PermissionlessAccounting, variable.sensitivity))
            .detail("sources", targets.join(", "))
            .detail(
                "readers",
                readers.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", "),
            );
            for reader in &readers {
                builder = builder.function((*reader).clone());
            }
            for source in &sources {
                builder = builder.operation(source.call.clone());
            }
            for (write, _) in &writes {
                builder = builder.operation(write.at.clone());
                for step in &write.taint.chain {
                    builder = builder.evidence(step.clone());
                }
            }
            findings.push(builder.build());
        }
        findings
    }
}

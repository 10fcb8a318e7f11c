//! Entry-point ranking

use crate::features::dependency_graph::DependencyGraph;
use crate::features::triage::domain::TriageEntry;
use crate::shared::models::{AccessControl, ProgramModel};

/// Rank externally callable functions by how much value-moving surface they
/// expose. Ties break on function id.
pub fn triage_entrypoints(
    model: &ProgramModel,
    graph: &DependencyGraph,
    permissionless_only: bool,
    limit: usize,
) -> Vec<TriageEntry> {
    let index = model.index();
    let mut entries: Vec<TriageEntry> = model
        .functions()
        .filter(|f| f.is_entrypoint())
        .filter_map(|f| {
            let permissionless = f.is_attacker_callable(&model.roles);
            if permissionless_only && !permissionless {
                return None;
            }
            let footprint = graph.footprint(&f.id)?;
            let sensitive_writes = footprint
                .writes
                .iter()
                .filter(|v| index.variable(v).is_some_and(|v| v.sensitivity.is_economic()))
                .count();
            Some(TriageEntry {
                function: f.id.clone(),
                contract: f.contract.clone(),
                external_calls: footprint.external_calls,
                sensitive_writes,
                writes: footprint.writes.len(),
                reads: footprint.reads.len(),
                role: match &f.access {
                    AccessControl::Permissioned(role) => Some(role.clone()),
                    _ => None,
                },
                permissionless,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.rank_key()
            .cmp(&a.rank_key())
            .then_with(|| a.function.cmp(&b.function))
    });
    entries.truncate(limit);
    entries
}

//! Interleaving test
//!
//! For every window anchor of A and every state-changing entry point B whose
//! reads intersect the window's pending set, B is executed twice: once on the
//! state A has reached at the anchor and once on the state after A settles.
//! Any difference in B's observable result is an interleaving finding.

use super::context::CompositionContext;
use super::inputs::{concrete_state, default_args};
use crate::features::aggregation::scoring;
use crate::features::composition::domain::{AbstractState, CallSpec, Outcome};
use crate::features::window_analysis::WindowReport;
use crate::shared::budget::{BudgetExhausted, UnitBudget};
use crate::shared::models::{Finding, FindingCategory, Function, OpRef, VarId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// What an external observer sees of one call
#[derive(Debug, PartialEq, Eq)]
struct Observation {
    status: &'static str,
    returned: Option<String>,
    /// Change applied to each written variable
    deltas: BTreeMap<VarId, String>,
}

impl Observation {
    fn render(&self) -> String {
        let mut parts = vec![self.status.to_string()];
        if let Some(returned) = &self.returned {
            parts.push(format!("returns {}", returned));
        }
        parts.extend(self.deltas.iter().map(|(var, delta)| format!("{} += {}", var, delta)));
        parts.join(", ")
    }
}

fn observe(before: &AbstractState, outcome: &Outcome, writes: &BTreeSet<VarId>) -> Observation {
    match outcome {
        Outcome::Completed { state, returned } => Observation {
            status: "completed",
            returned: returned.as_ref().map(|v| v.to_string()),
            deltas: writes
                .iter()
                .map(|var| {
                    let after = state.get(var);
                    let delta = match (after.as_const(), before.get(var).as_const()) {
                        (Some(x), Some(y)) => x.checked_sub(y).map_or_else(|| after.to_string(), |d| d.to_string()),
                        _ => after.to_string(),
                    };
                    (var.clone(), delta)
                })
                .collect(),
        },
        other => Observation {
            status: other.kind(),
            returned: None,
            deltas: BTreeMap::new(),
        },
    }
}

/// Test every window anchor of `a`
pub fn check_function(
    ctx: &CompositionContext<'_>,
    a: &Function,
    report: &WindowReport,
    budget: &mut UnitBudget,
) -> Result<Vec<Finding>, BudgetExhausted> {
    let Some(a) = ctx.function(&a.id) else {
        return Ok(Vec::new());
    };
    let sim = ctx.simulator();
    let args_a = default_args(a);
    let base = concrete_state(&ctx.input.initial_state);

    // anchor -> pending across traces
    let mut anchors: BTreeMap<&OpRef, BTreeSet<VarId>> = BTreeMap::new();
    for window in &report.windows {
        anchors
            .entry(&window.anchor)
            .or_default()
            .extend(window.pending.iter().cloned());
    }

    let settled = match sim.run(a, &args_a, base.clone(), None, budget)? {
        Outcome::Completed { state, .. } => state,
        other => {
            debug!("{}: settled run {}", a.id, other.kind());
            return Ok(Vec::new());
        }
    };

    let mut findings = Vec::new();
    for (anchor, pending) in anchors {
        if pending.is_empty() {
            continue;
        }
        let partial = match sim.run(a, &args_a, base.clone(), Some(anchor), budget)? {
            Outcome::Suspended { state } => state,
            other => {
                debug!("{}: anchor {} not reached ({})", a.id, anchor, other.kind());
                continue;
            }
        };

        for b in ctx.index.model.functions() {
            if b.id == a.id || b.view || !b.is_entrypoint() || b.shares_guard_with(a) {
                continue;
            }
            let overlap: BTreeSet<VarId> = ctx.reads(&b.id).intersection(&pending).cloned().collect();
            if overlap.is_empty() {
                continue;
            }

            let args_b = default_args(b);
            let writes_b = ctx.writes(&b.id);
            let during = sim.run(b, &args_b, partial.clone(), None, budget)?;
            let after = sim.run(b, &args_b, settled.clone(), None, budget)?;
            if matches!(during, Outcome::Indeterminate { .. }) || matches!(after, Outcome::Indeterminate { .. }) {
                continue;
            }
            let during = observe(&partial, &during, &writes_b);
            let after = observe(&settled, &after, &writes_b);
            if during == after {
                continue;
            }

            let call_a = CallSpec::new(a, args_a.clone()).witness();
            let call_b = CallSpec::new(b, args_b).witness();
            let sensitivity = scoring::max_sensitivity(ctx.index, overlap.iter());
            findings.push(
                Finding::builder(FindingCategory::Interleaving, a.contract.clone(), a.id.clone())
                    .title(format!(
                        "{} behaves differently when called during the external call at {}",
                        b.name(),
                        anchor
                    ))
                    .function(b.id.clone())
                    .variables(overlap.iter())
                    .operation(anchor.clone())
                    .severity(scoring::score(FindingCategory::Interleaving, sensitivity))
                    .sequence(vec![
                        call_a.clone().with_state(partial.snapshot(&pending)),
                        call_b.clone(),
                    ])
                    .alternate_sequence(vec![call_a.with_state(settled.snapshot(&pending)), call_b])
                    .evidence(format!("{} reads pending {}", b.name(), join(&overlap)))
                    .evidence(format!("inside window: {}", during.render()))
                    .evidence(format!("after settlement: {}", after.render()))
                    .detail("anchor", anchor)
                    .detail("during_window", during.render())
                    .detail("after_settlement", after.render())
                    .build(),
            );
        }
    }
    Ok(findings)
}

fn join(vars: &BTreeSet<VarId>) -> String {
    vars.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

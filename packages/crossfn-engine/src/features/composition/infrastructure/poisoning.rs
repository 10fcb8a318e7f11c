//! State-poisoning test
//!
//! A is callable by an attacker and writes something B reads. If B succeeds
//! from the base state but reverts after A runs with some candidate input, A
//! can deny B to everyone else.

use super::context::CompositionContext;
use super::inputs::{combinations, concrete_state, default_args, poison_candidates};
use crate::features::aggregation::scoring;
use crate::features::composition::domain::{CallSpec, Outcome};
use crate::shared::budget::{BudgetExhausted, UnitBudget};
use crate::shared::models::{Finding, FindingCategory, Function, VarId};
use std::collections::BTreeSet;

/// Whether `a` qualifies as the poisoning side against `b`
pub fn is_candidate(ctx: &CompositionContext<'_>, a: &Function, b: &Function) -> bool {
    a.id != b.id
        && !a.view
        && a.is_attacker_callable(ctx.index.roles())
        && b.is_entrypoint()
        && !b.view
        && !shared_vars(ctx, a, b).is_empty()
}

fn shared_vars(ctx: &CompositionContext<'_>, a: &Function, b: &Function) -> BTreeSet<VarId> {
    ctx.writes(&a.id)
        .intersection(&ctx.reads(&b.id))
        .cloned()
        .collect()
}

/// Does some input to `a` make `b` revert?
pub fn check_pair(
    ctx: &CompositionContext<'_>,
    a: &Function,
    b: &Function,
    budget: &mut UnitBudget,
) -> Result<Option<Finding>, BudgetExhausted> {
    let (Some(a), Some(b)) = (ctx.function(&a.id), ctx.function(&b.id)) else {
        return Ok(None);
    };
    if !is_candidate(ctx, a, b) {
        return Ok(None);
    }
    let sim = ctx.simulator();
    let base = concrete_state(&ctx.input.initial_state);
    let call_b = CallSpec::new(b, default_args(b));

    if !sim.run(b, &call_b.args, base.clone(), None, budget)?.is_completed() {
        return Ok(None);
    }

    for args in combinations(a, poison_candidates) {
        let poisoned = match sim.run(a, &args, base.clone(), None, budget)? {
            Outcome::Completed { state, .. } => state,
            _ => continue,
        };
        let Outcome::Reverted { reason, at } = sim.run(b, &call_b.args, poisoned.clone(), None, budget)? else {
            continue;
        };

        let shared = shared_vars(ctx, a, b);
        let call_a = CallSpec::new(a, args);
        let sensitivity = scoring::max_sensitivity(ctx.index, shared.iter());
        let mut builder = Finding::builder(FindingCategory::StatePoisoning, a.contract.clone(), a.id.clone())
            .title(format!("{} can make {} revert for everyone", call_a.witness(), b.name()))
            .function(b.id.clone())
            .variables(shared.iter())
            .severity(scoring::score(FindingCategory::StatePoisoning, sensitivity))
            .sequence(vec![
                call_a.witness().with_state(poisoned.snapshot(&shared)),
                call_b.witness(),
            ])
            .alternate_sequence(vec![call_b.witness()])
            .evidence(format!("{} succeeds from the base state", call_b.witness()))
            .evidence(format!("after {}: {}", call_a.witness(), reason))
            .detail("revert_reason", &reason);
        if let Some(at) = at {
            builder = builder.operation(at.clone()).detail("reverts_at", at);
        }
        return Ok(Some(builder.build()));
    }
    Ok(None)
}

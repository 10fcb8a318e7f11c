//! Bounded search for invariant-breaking call sequences
//!
//! Breadth-first over sequences of mover calls up to `sequence_depth`, from the
//! known initial state with undeclared variables at zero. Calls that revert or
//! cannot be decided prune the branch; repeated states are expanded once. The
//! first sequence whose final state violates the invariant is reported, so the
//! counterexample is always a shortest one.

use super::coefficients::rank_movers;
use super::context::CompositionContext;
use super::inputs::{combinations, search_candidates};
use super::simulator::Simulator;
use crate::features::aggregation::scoring;
use crate::features::composition::domain::{AbstractState, AbstractValue, CallSpec, Outcome, Seed};
use crate::shared::budget::{BudgetExhausted, UnitBudget};
use crate::shared::models::{
    Diagnostic, Finding, FindingCategory, Function, Invariant, InvariantOrigin, VarId, WitnessCall,
};
use rustc_hash::FxHashSet;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

struct Node {
    state: AbstractState,
    steps: Vec<WitnessCall>,
}

pub fn search(
    ctx: &CompositionContext<'_>,
    invariant: &Invariant,
    budget: &mut UnitBudget,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Option<Finding>, BudgetExhausted> {
    let unit = format!("sequence:{}", invariant.name);
    let Some(terms) = ctx.graph.invariant_terms.get(&invariant.name) else {
        return Ok(None);
    };
    let movers = rank_movers(ctx.index, &terms.movers, &terms.terms);
    if movers.is_empty() {
        debug!("{}: no movers", unit);
        return Ok(None);
    }

    let initial = AbstractState::with_known(Seed::Concrete(0), &ctx.input.initial_state);
    match Simulator::check(&invariant.expr, &initial) {
        Some(true) => {}
        Some(false) => {
            debug!("{}: violated in the initial state", unit);
            return Ok(None);
        }
        None => {
            diagnostics.push(Diagnostic::Indeterminate {
                unit,
                reason: format!("invariant {} undecidable on the initial state", invariant.expr),
            });
            return Ok(None);
        }
    }

    let calls: Vec<(&Function, CallSpec)> = movers
        .iter()
        .flat_map(|f| {
            combinations(f, search_candidates)
                .into_iter()
                .map(move |args| (*f, CallSpec::new(f, args)))
        })
        .collect();

    let sim = ctx.simulator();
    let mut visited: FxHashSet<Vec<(VarId, AbstractValue)>> = FxHashSet::default();
    visited.insert(initial.fingerprint());
    let mut queue = VecDeque::from([Node {
        state: initial,
        steps: Vec::new(),
    }]);

    while let Some(node) = queue.pop_front() {
        for (function, call) in &calls {
            let state = match sim.run(*function, &call.args, node.state.clone(), None, budget)? {
                Outcome::Completed { state, .. } => state,
                _ => continue,
            };
            let mut steps = node.steps.clone();
            steps.push(call.witness().with_state(state.snapshot(&terms.terms)));

            match Simulator::check(&invariant.expr, &state) {
                Some(false) => return Ok(counterexample(ctx, invariant, &terms.terms, steps)),
                Some(true) => {}
                None => continue,
            }
            if steps.len() < ctx.config.sequence_depth && visited.insert(state.fingerprint()) {
                queue.push_back(Node { state, steps });
            }
        }
    }
    debug!("{}: no violation within {} calls", unit, ctx.config.sequence_depth);
    Ok(None)
}

fn counterexample(
    ctx: &CompositionContext<'_>,
    invariant: &Invariant,
    terms: &BTreeSet<VarId>,
    steps: Vec<WitnessCall>,
) -> Option<Finding> {
    let last = ctx.function(&steps.last()?.function)?;
    let sensitivity = scoring::max_sensitivity(ctx.index, terms.iter());
    let display = steps.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" -> ");

    let mut builder = Finding::builder(FindingCategory::InvariantSequence, last.contract.clone(), last.id.clone())
        .title(format!("{} violates invariant {}", display, invariant.name))
        .key(format!("invariant:{}", invariant.name))
        .variables(terms.iter())
        .severity(scoring::score(FindingCategory::InvariantSequence, sensitivity))
        .evidence(format!("invariant: {}", invariant.expr))
        .detail("invariant", &invariant.name)
        .detail("expr", &invariant.expr)
        .detail("length", steps.len());
    if let InvariantOrigin::Derived { from } = &invariant.origin {
        builder = builder.detail("derived_from", from);
    }
    for call in &steps {
        let state = call
            .state_after
            .iter()
            .map(|(var, value)| format!("{}={}", var, value))
            .collect::<Vec<_>>()
            .join(", ");
        builder = builder.evidence(format!("{} -> {}", call, state));
    }
    Some(builder.sequence(steps).build())
}

//! Amplification test
//!
//! Compares one call with amount `N` against `k` consecutive calls with
//! `N / k` (the remainder goes to the last call). A per-variable difference
//! larger than `k` rounding units means rounding compounds with repetition.

use super::context::CompositionContext;
use super::inputs::{concrete_state, default_args, DEFAULT_AMOUNT};
use crate::features::aggregation::scoring;
use crate::features::composition::domain::{AbstractState, CallSpec, Outcome};
use crate::shared::budget::{BudgetExhausted, UnitBudget};
use crate::shared::models::{Finding, FindingCategory, Function, Param, VarId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Name used for the summed return value in comparisons
const RETURN_KEY: &str = "return";

/// Net effect of one or more calls
#[derive(Debug, Default)]
struct Effect {
    deltas: BTreeMap<String, i128>,
}

/// Flagged split factor with its per-quantity differences
#[derive(Debug)]
struct Amplified {
    factor: u64,
    amount: i128,
    /// quantity -> (single, split)
    diverging: BTreeMap<String, (i128, i128)>,
}

pub fn check_function(
    ctx: &CompositionContext<'_>,
    function: &Function,
    budget: &mut UnitBudget,
) -> Result<Vec<Finding>, BudgetExhausted> {
    let Some(function) = ctx.function(&function.id) else {
        return Ok(Vec::new());
    };
    let mut findings = Vec::new();
    for param in function.params.iter().filter(|p| p.is_amount) {
        if let Some(finding) = check_param(ctx, function, param, budget)? {
            findings.push(finding);
        }
    }
    Ok(findings)
}

fn check_param<'a>(
    ctx: &CompositionContext<'a>,
    function: &'a Function,
    param: &Param,
    budget: &mut UnitBudget,
) -> Result<Option<Finding>, BudgetExhausted> {
    let amount = param.samples.first().copied().unwrap_or(DEFAULT_AMOUNT);
    let writes = ctx.writes(&function.id);
    let base = concrete_state(&ctx.input.initial_state);

    let Some(single) = execute(ctx, function, param, &[amount], &base, &writes, budget)? else {
        return Ok(None);
    };

    let mut flagged: Option<Amplified> = None;
    let mut checked = Vec::new();
    for &factor in &ctx.config.amplification_factors {
        let k = factor as i128;
        if k < 2 || amount < k {
            debug!("{}: skip k={} for {}={}", function.id, k, param.name, amount);
            continue;
        }
        let parts = split_amounts(amount, factor);
        let Some(split) = execute(ctx, function, param, &parts, &base, &writes, budget)? else {
            continue;
        };
        checked.push(factor);

        let keys: BTreeSet<&String> = single.deltas.keys().chain(split.deltas.keys()).collect();
        let diverging: BTreeMap<String, (i128, i128)> = keys
            .into_iter()
            .filter_map(|key| {
                let s = single.deltas.get(key).copied().unwrap_or(0);
                let p = split.deltas.get(key).copied().unwrap_or(0);
                // a difference too large for i128 diverges by any measure
                let diverges = p.checked_sub(s).and_then(i128::checked_abs).map_or(true, |d| d > k);
                diverges.then(|| (key.clone(), (s, p)))
            })
            .collect();
        if !diverging.is_empty() {
            flagged = Some(Amplified {
                factor,
                amount,
                diverging,
            });
            break;
        }
    }

    let Some(hit) = flagged else {
        return Ok(None);
    };

    let variables: BTreeSet<VarId> = hit
        .diverging
        .keys()
        .filter(|k| k.as_str() != RETURN_KEY)
        .map(|k| VarId::from(k.as_str()))
        .collect();
    let sensitivity = scoring::max_sensitivity(ctx.index, variables.iter());
    let single_call = call(function, param, hit.amount);
    let split_calls: Vec<_> = split_amounts(hit.amount, hit.factor)
        .into_iter()
        .map(|part| call(function, param, part).witness())
        .collect();

    let mut builder = Finding::builder(FindingCategory::Amplification, function.contract.clone(), function.id.clone())
        .title(format!(
            "splitting {} of {} into {} calls changes the outcome",
            param.name,
            function.name(),
            hit.factor
        ))
        .key(format!("param:{}", param.name))
        .variables(variables.iter())
        .severity(scoring::score(FindingCategory::Amplification, sensitivity))
        .sequence(split_calls)
        .alternate_sequence(vec![single_call.witness()])
        .detail("param", &param.name)
        .detail("amount", hit.amount)
        .detail("factor", hit.factor)
        .detail(
            "factors_checked",
            checked.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(","),
        );
    for (key, (single, split)) in &hit.diverging {
        let favors = if split > single { "caller" } else { "protocol" };
        builder = builder
            .evidence(format!(
                "{}: single call {}, {} calls {} (difference {})",
                key,
                single,
                hit.factor,
                split,
                split.checked_sub(*single).map_or_else(|| "overflow".to_string(), |d| d.to_string())
            ))
            .detail(format!("{}.single", key), single)
            .detail(format!("{}.split", key), split)
            .detail(format!("{}.favors", key), favors);
    }
    Ok(Some(builder.build()))
}

fn split_amounts(amount: i128, factor: u64) -> Vec<i128> {
    let k = factor as i128;
    let mut parts = vec![amount / k; factor as usize];
    if let Some(last) = parts.last_mut() {
        *last += amount % k;
    }
    parts
}

fn call(function: &Function, param: &Param, amount: i128) -> CallSpec {
    let args = default_args(function)
        .into_iter()
        .map(|(name, value)| if name == param.name { (name, amount) } else { (name, value) })
        .collect();
    CallSpec::new(function, args)
}

/// Run consecutive calls with the given amounts; `None` when any call does not
/// complete with concrete results
fn execute<'a>(
    ctx: &CompositionContext<'a>,
    function: &'a Function,
    param: &Param,
    amounts: &[i128],
    base: &AbstractState,
    writes: &BTreeSet<VarId>,
    budget: &mut UnitBudget,
) -> Result<Option<Effect>, BudgetExhausted> {
    let sim = ctx.simulator();
    let mut state = base.clone();
    let mut returned_total = 0i128;
    let mut has_return = false;
    for amount in amounts {
        let spec = call(function, param, *amount);
        match sim.run(function, &spec.args, state, None, budget)? {
            Outcome::Completed { state: next, returned } => {
                state = next;
                if let Some(value) = returned {
                    let Some(v) = value.as_const() else {
                        return Ok(None);
                    };
                    let Some(total) = returned_total.checked_add(v) else {
                        debug!("{}: summed return overflows", function.id);
                        return Ok(None);
                    };
                    returned_total = total;
                    has_return = true;
                }
            }
            other => {
                debug!("{}({}) {}", function.id, amount, other.kind());
                return Ok(None);
            }
        }
    }

    let mut effect = Effect::default();
    for var in writes {
        let (Some(after), Some(before)) = (state.get(var).as_const(), base.get(var).as_const()) else {
            return Ok(None);
        };
        let Some(delta) = after.checked_sub(before) else {
            debug!("{}: delta of {} overflows", function.id, var);
            return Ok(None);
        };
        effect.deltas.insert(var.to_string(), delta);
    }
    if has_return {
        effect.deltas.insert(RETURN_KEY.to_string(), returned_total);
    }
    Ok(Some(effect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_amounts_keep_total() {
        let parts = split_amounts(1003, 10);
        assert_eq!(parts.len(), 10);
        assert_eq!(parts.iter().sum::<i128>(), 1003);
        assert_eq!(parts[9], 103);
    }
}

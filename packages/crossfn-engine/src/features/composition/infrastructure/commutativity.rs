//! Commutativity test
//!
//! For a coupled pair (A, B) both orders are executed from the same state and
//! the final values of every variable either function writes are compared.
//! Symbolic seeds are tried first; when a branch or comparison cannot be
//! decided symbolically the test is repeated with concrete seeds.

use super::context::CompositionContext;
use super::inputs::{concrete_state, default_args, symbolic_state};
use super::simulator::Simulator;
use crate::features::aggregation::scoring;
use crate::features::composition::domain::{AbstractState, AbstractValue, CallSpec, Outcome};
use crate::shared::budget::{BudgetExhausted, UnitBudget};
use crate::shared::models::{CmpOp, Diagnostic, Finding, FindingCategory, Function, VarId};
use std::collections::BTreeSet;
use tracing::debug;

struct OrderRun {
    after_first: AbstractState,
    after_second: AbstractState,
    first_returned: Option<AbstractValue>,
    second_returned: Option<AbstractValue>,
}

enum PairRun {
    Done(OrderRun),
    Reverted(String),
    Indeterminate(String),
}

enum Verdict {
    Commute,
    Diverge(BTreeSet<VarId>),
    Undecided(VarId),
}

fn run_order<'a>(
    sim: &Simulator<'a>,
    first: (&'a Function, &[(String, i128)]),
    second: (&'a Function, &[(String, i128)]),
    state: AbstractState,
    budget: &mut UnitBudget,
) -> Result<PairRun, BudgetExhausted> {
    let (after_first, first_returned) = match sim.run(first.0, first.1, state, None, budget)? {
        Outcome::Completed { state, returned } => (state, returned),
        Outcome::Indeterminate { reason } => return Ok(PairRun::Indeterminate(reason)),
        other => return Ok(PairRun::Reverted(format!("{} {}", first.0.id, other.kind()))),
    };
    match sim.run(second.0, second.1, after_first.clone(), None, budget)? {
        Outcome::Completed { state, returned } => Ok(PairRun::Done(OrderRun {
            after_first,
            after_second: state,
            first_returned,
            second_returned: returned,
        })),
        Outcome::Indeterminate { reason } => Ok(PairRun::Indeterminate(reason)),
        other => Ok(PairRun::Reverted(format!("{} {}", second.0.id, other.kind()))),
    }
}

fn compare_states(vars: &BTreeSet<VarId>, ab: &AbstractState, ba: &AbstractState) -> Verdict {
    let mut diverging = BTreeSet::new();
    for var in vars {
        let (x, y) = (ab.get(var), ba.get(var));
        if x == y {
            continue;
        }
        match (&x, &y) {
            (AbstractValue::Linear(_), AbstractValue::Linear(_)) => {
                diverging.insert(var.clone());
            }
            _ => return Verdict::Undecided(var.clone()),
        }
    }
    if diverging.is_empty() {
        Verdict::Commute
    } else {
        Verdict::Diverge(diverging)
    }
}

/// `Some(true)` when `x` is strictly greater than `y`
fn greater(x: &Option<AbstractValue>, y: &Option<AbstractValue>) -> Option<bool> {
    match (x, y) {
        (Some(x), Some(y)) if x != y => AbstractValue::compare(CmpOp::Gt, x, y),
        _ => None,
    }
}

/// Test one coupled pair
pub fn check_pair(
    ctx: &CompositionContext<'_>,
    a: &Function,
    b: &Function,
    budget: &mut UnitBudget,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Option<Finding>, BudgetExhausted> {
    let (Some(a), Some(b)) = (ctx.function(&a.id), ctx.function(&b.id)) else {
        return Ok(None);
    };
    let sim = ctx.simulator();
    let args_a = default_args(a);
    let args_b = default_args(b);
    let compared: BTreeSet<VarId> = ctx.writes(&a.id).union(&ctx.writes(&b.id)).cloned().collect();
    let unit = format!("pair:{}+{}", a.id, b.id);

    let seeds = [
        ("symbolic", symbolic_state(&ctx.input.initial_state)),
        ("concrete", concrete_state(&ctx.input.initial_state)),
    ];
    for (mode, state) in seeds {
        let ab = run_order(&sim, (a, &args_a), (b, &args_b), state.clone(), budget)?;
        let ba = run_order(&sim, (b, &args_b), (a, &args_a), state, budget)?;
        let (ab, ba) = match (ab, ba) {
            (PairRun::Done(ab), PairRun::Done(ba)) => (ab, ba),
            (PairRun::Reverted(reason), _) | (_, PairRun::Reverted(reason)) => {
                debug!("{}: {} run reverted: {}", unit, mode, reason);
                if mode == "concrete" {
                    return Ok(None);
                }
                continue;
            }
            (PairRun::Indeterminate(reason), _) | (_, PairRun::Indeterminate(reason)) => {
                debug!("{}: {} run indeterminate: {}", unit, mode, reason);
                if mode == "concrete" {
                    diagnostics.push(Diagnostic::Indeterminate { unit, reason });
                    return Ok(None);
                }
                continue;
            }
        };

        let diverging = match compare_states(&compared, &ab.after_second, &ba.after_second) {
            Verdict::Commute => return Ok(None),
            Verdict::Diverge(vars) => vars,
            Verdict::Undecided(var) => {
                if mode == "concrete" {
                    diagnostics.push(Diagnostic::Indeterminate {
                        unit,
                        reason: format!("final values of {} are not comparable", var),
                    });
                    return Ok(None);
                }
                continue;
            }
        };

        let call_a = CallSpec::new(a, args_a.clone());
        let call_b = CallSpec::new(b, args_b.clone());
        let order_ab = format!("{} -> {}", a.name(), b.name());
        let order_ba = format!("{} -> {}", b.name(), a.name());

        // A's return in A-first vs A-second, then B's
        let (beneficiary, favored) = if let Some(a_first) = greater(&ab.first_returned, &ba.second_returned) {
            (a.id.to_string(), if a_first { &order_ab } else { &order_ba })
        } else if let Some(b_second) = greater(&ab.second_returned, &ba.first_returned) {
            (b.id.to_string(), if b_second { &order_ab } else { &order_ba })
        } else {
            probe_beneficiary(ctx, &ab.after_second, &ba.after_second, &order_ab, &order_ba)
                .unwrap_or_else(|| ("undetermined".to_string(), &order_ab))
        };

        let sensitivity = scoring::max_sensitivity(ctx.index, diverging.iter());
        let mut builder = Finding::builder(FindingCategory::NonCommutative, a.contract.clone(), a.id.clone())
            .title(format!(
                "{} and {} do not commute on {}",
                a.name(),
                b.name(),
                join(&diverging)
            ))
            .function(b.id.clone())
            .variables(diverging.iter())
            .severity(scoring::score(FindingCategory::NonCommutative, sensitivity))
            .sequence(vec![
                call_a.witness().with_state(ab.after_first.snapshot(&compared)),
                call_b.witness().with_state(ab.after_second.snapshot(&compared)),
            ])
            .alternate_sequence(vec![
                call_b.witness().with_state(ba.after_first.snapshot(&compared)),
                call_a.witness().with_state(ba.after_second.snapshot(&compared)),
            ])
            .evidence(format!("both orders start from the same {} state", mode))
            .detail("mode", mode)
            .detail("beneficiary", beneficiary)
            .detail("favored_order", favored);
        for var in &diverging {
            builder = builder
                .evidence(format!(
                    "{}: {} after {}, {} after {}",
                    var,
                    ab.after_second.get(var),
                    order_ab,
                    ba.after_second.get(var),
                    order_ba
                ))
                .detail(format!("{}[{}]", var, order_ab), ab.after_second.get(var))
                .detail(format!("{}[{}]", var, order_ba), ba.after_second.get(var));
        }
        return Ok(Some(builder.build()));
    }
    Ok(None)
}

/// First probe whose value differs between the two final states
fn probe_beneficiary<'o>(
    ctx: &CompositionContext<'_>,
    ab: &AbstractState,
    ba: &AbstractState,
    order_ab: &'o String,
    order_ba: &'o String,
) -> Option<(String, &'o String)> {
    ctx.input.probes.iter().find_map(|probe| {
        let x = Simulator::value(&probe.expr, ab);
        let y = Simulator::value(&probe.expr, ba);
        greater(&x, &y).map(|ab_higher| {
            (
                format!("probe {}", probe.name),
                if ab_higher { order_ab } else { order_ba },
            )
        })
    })
}

fn join(vars: &BTreeSet<VarId>) -> String {
    vars.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::features::dependency_graph::DependencyGraphBuilder;
    use crate::shared::models::{
        AccessControl, AnalysisInput, Contract, Operation, Param, ProgramModel, StorageVariable,
        ValueExpr,
    };

    fn function(name: &str, params: Vec<Param>, body: Vec<Operation>) -> Function {
        Function {
            id: format!("C.{}", name).into(),
            contract: "C".into(),
            access: AccessControl::Unrestricted,
            external: true,
            view: false,
            reentrancy_guard: None,
            params,
            preconditions: vec![],
            body,
        }
    }

    fn bump(var: &str, value: ValueExpr) -> Vec<Operation> {
        vec![
            Operation::StorageRead {
                var: format!("C.{}", var).into(),
                bind: Some("v".to_string()),
            },
            Operation::StorageWrite {
                var: format!("C.{}", var).into(),
                value,
            },
        ]
    }

    fn check(functions: Vec<Function>) -> Option<Finding> {
        let input = AnalysisInput::new(ProgramModel {
            contracts: vec![Contract {
                id: "C".into(),
                functions,
                variables: vec![StorageVariable {
                    id: "C.x".into(),
                    contract: "C".into(),
                    slot: String::new(),
                    ty: Default::default(),
                    sensitivity: Default::default(),
                }],
            }],
            roles: vec![],
        });
        let config = EngineConfig::default();
        let graph = DependencyGraphBuilder::new(&config).build(&input, &[]).unwrap();
        let index = input.model.index();
        let ctx = CompositionContext::new(&index, &graph, &input, &config);
        let a = index.function(&"C.a".into()).unwrap();
        let b = index.function(&"C.b".into()).unwrap();
        let mut diagnostics = Vec::new();
        check_pair(&ctx, a, b, &mut UnitBudget::unlimited(), &mut diagnostics).unwrap()
    }

    #[test]
    fn test_additions_commute_symbolically() {
        let finding = check(vec![
            function("a", vec![Param::amount("n")], bump("x", ValueExpr::local("v").add(ValueExpr::param("n")))),
            function("b", vec![], bump("x", ValueExpr::local("v").add(ValueExpr::constant(3)))),
        ]);
        assert!(finding.is_none());
    }

    #[test]
    fn test_scaling_and_adding_diverge() {
        let finding = check(vec![
            function("a", vec![], bump("x", ValueExpr::local("v").mul(ValueExpr::constant(2)))),
            function("b", vec![], bump("x", ValueExpr::local("v").add(ValueExpr::constant(3)))),
        ])
        .expect("finding");
        assert_eq!(finding.category, FindingCategory::NonCommutative);
        assert_eq!(finding.details["mode"], "symbolic");
        assert_eq!(finding.sequence.len(), 2);
        assert_eq!(finding.alternate_sequence.len(), 2);
        assert!(finding.witness.variables.contains(&VarId::from("C.x")));
    }
}

//! Abstract interpreter over function bodies
//!
//! Executes one call against an [`AbstractState`]: preconditions first, then
//! the body in program order with internal calls inlined under the same depth
//! rule as the dependency graph. A branch or guard whose condition cannot be
//! decided ends the run as `Indeterminate`; the caller decides whether to retry
//! with concrete seeds.

use crate::features::composition::domain::{AbstractState, AbstractValue, Outcome, Seed};
use crate::features::dependency_graph::{CallResolution, InternalCallGraph};
use crate::shared::budget::{BudgetExhausted, UnitBudget};
use crate::shared::models::{
    Arm, CondExpr, Function, ModelIndex, OpPath, OpRef, Operation, ValueExpr,
};
use std::collections::BTreeMap;

/// Why execution left the straight-line path
enum Halt {
    Revert { reason: String, at: Option<OpRef> },
    Indeterminate(String),
    Suspend,
    Budget(BudgetExhausted),
}

impl From<BudgetExhausted> for Halt {
    fn from(exhausted: BudgetExhausted) -> Self {
        Halt::Budget(exhausted)
    }
}

enum Flow {
    Continue,
    Returned(Option<AbstractValue>),
}

/// Names visible to an expression
#[derive(Default)]
struct Bindings {
    params: BTreeMap<String, AbstractValue>,
    locals: BTreeMap<String, AbstractValue>,
}

struct Frame<'a> {
    function: &'a Function,
    bindings: Bindings,
    depth: usize,
}

impl Frame<'_> {
    fn origin(&self, path: &OpPath) -> OpRef {
        OpRef::new(self.function.id.clone(), path.clone())
    }
}

#[derive(Clone, Copy)]
pub struct Simulator<'a> {
    index: &'a ModelIndex<'a>,
    call_graph: &'a InternalCallGraph,
    max_depth: usize,
}

impl<'a> Simulator<'a> {
    pub fn new(index: &'a ModelIndex<'a>, call_graph: &'a InternalCallGraph, max_depth: usize) -> Self {
        Self {
            index,
            call_graph,
            max_depth,
        }
    }

    /// Run `function` with `args` on `state`.
    ///
    /// With `stop_at`, execution suspends right before that operation and the
    /// state reached so far is returned.
    pub fn run(
        &self,
        function: &'a Function,
        args: &[(String, i128)],
        state: AbstractState,
        stop_at: Option<&OpRef>,
        budget: &mut UnitBudget,
    ) -> Result<Outcome, BudgetExhausted> {
        let params = args
            .iter()
            .map(|(name, value)| (name.clone(), AbstractValue::constant(*value)))
            .collect();
        self.run_with(function, params, state, stop_at, budget)
    }

    /// Like [`Simulator::run`] with abstract arguments
    pub fn run_with(
        &self,
        function: &'a Function,
        params: BTreeMap<String, AbstractValue>,
        mut state: AbstractState,
        stop_at: Option<&OpRef>,
        budget: &mut UnitBudget,
    ) -> Result<Outcome, BudgetExhausted> {
        let mut frame = Frame {
            function,
            bindings: Bindings {
                params,
                locals: BTreeMap::new(),
            },
            depth: 0,
        };

        for (i, pre) in function.preconditions.iter().enumerate() {
            match eval_cond(pre, &frame.bindings, &state) {
                Ok(Some(true)) => {}
                Ok(Some(false)) => {
                    return Ok(Outcome::Reverted {
                        reason: format!("precondition #{} ({}) fails", i, pre),
                        at: None,
                    })
                }
                Ok(None) => {
                    return Ok(Outcome::Indeterminate {
                        reason: format!("precondition #{} ({}) undecidable", i, pre),
                    })
                }
                Err(Halt::Indeterminate(reason)) => return Ok(Outcome::Indeterminate { reason }),
                Err(_) => {
                    return Ok(Outcome::Reverted {
                        reason: format!("precondition #{} ({}) fails", i, pre),
                        at: None,
                    })
                }
            }
        }

        let result = self.exec(&function.body, None, &mut frame, &mut state, stop_at, budget);
        Ok(match result {
            Ok(Flow::Continue) => Outcome::Completed {
                state,
                returned: None,
            },
            Ok(Flow::Returned(returned)) => Outcome::Completed { state, returned },
            Err(Halt::Suspend) => Outcome::Suspended { state },
            Err(Halt::Revert { reason, at }) => Outcome::Reverted { reason, at },
            Err(Halt::Indeterminate(reason)) => Outcome::Indeterminate { reason },
            Err(Halt::Budget(exhausted)) => return Err(exhausted),
        })
    }

    /// Evaluate a declarative condition (invariant, precondition) on `state`
    pub fn check(cond: &CondExpr, state: &AbstractState) -> Option<bool> {
        eval_cond(cond, &Bindings::default(), state).ok().flatten()
    }

    /// Evaluate a declarative value expression (probe) on `state`
    pub fn value(expr: &ValueExpr, state: &AbstractState) -> Option<AbstractValue> {
        eval(expr, &Bindings::default(), state).ok()
    }

    fn exec(
        &self,
        ops: &'a [Operation],
        parent: Option<(&OpPath, Arm)>,
        frame: &mut Frame<'a>,
        state: &mut AbstractState,
        stop_at: Option<&OpRef>,
        budget: &mut UnitBudget,
    ) -> Result<Flow, Halt> {
        for (i, op) in ops.iter().enumerate() {
            budget.tick()?;
            let path = match parent {
                None => OpPath::root(i as u32),
                Some((branch, arm)) => branch.child(arm, i as u32),
            };
            if stop_at.is_some_and(|target| target.function == frame.function.id && target.op == path)
            {
                return Err(Halt::Suspend);
            }

            match op {
                Operation::StorageRead { var, bind } => {
                    if let Some(local) = bind {
                        frame.bindings.locals.insert(local.clone(), state.get(var));
                    }
                }
                Operation::StorageWrite { var, value } => {
                    let value = eval(value, &frame.bindings, state).map_err(|halt| at(halt, frame, &path))?;
                    let unsigned = self.index.variable(var).is_some_and(|v| v.ty.is_unsigned());
                    if unsigned && value.as_const().is_some_and(|v| v < 0) {
                        return Err(Halt::Revert {
                            reason: format!("underflow writing {} = {}", var, value),
                            at: Some(frame.origin(&path)),
                        });
                    }
                    state.set(var.clone(), value);
                }
                Operation::ExternalCall {
                    target, returns, ..
                } => {
                    if let Some(local) = returns {
                        let value = match state.seed() {
                            Seed::Concrete(v) => AbstractValue::constant(v),
                            Seed::Symbolic => {
                                AbstractValue::symbol(format!("{}@{}", target.label, frame.origin(&path)))
                            }
                        };
                        frame.bindings.locals.insert(local.clone(), value);
                    }
                }
                Operation::CallbackPoint { .. } => {}
                Operation::Branch {
                    cond,
                    then_ops,
                    else_ops,
                } => {
                    let (arm, ops) = match eval_cond(cond, &frame.bindings, state) {
                        Ok(Some(true)) => (Arm::Then, then_ops),
                        Ok(Some(false)) => (Arm::Else, else_ops),
                        Ok(None) => {
                            return Err(Halt::Indeterminate(format!(
                                "branch {} at {} undecidable",
                                cond,
                                frame.origin(&path)
                            )))
                        }
                        Err(halt) => return Err(at(halt, frame, &path)),
                    };
                    if let Flow::Returned(value) =
                        self.exec(ops, Some((&path, arm)), frame, state, stop_at, budget)?
                    {
                        return Ok(Flow::Returned(value));
                    }
                }
                Operation::Require { cond } => match eval_cond(cond, &frame.bindings, state) {
                    Ok(Some(true)) => {}
                    Ok(Some(false)) => {
                        return Err(Halt::Revert {
                            reason: format!("require({}) fails", cond),
                            at: Some(frame.origin(&path)),
                        })
                    }
                    Ok(None) => {
                        return Err(Halt::Indeterminate(format!(
                            "require({}) at {} undecidable",
                            cond,
                            frame.origin(&path)
                        )))
                    }
                    Err(halt) => return Err(at(halt, frame, &path)),
                },
                Operation::InternalCall {
                    callee,
                    args,
                    returns,
                } => {
                    let target = match self.call_graph.resolve(
                        self.index,
                        frame.function,
                        callee,
                        frame.depth,
                        self.max_depth,
                    ) {
                        CallResolution::Inline(target) => target,
                        CallResolution::Recursive | CallResolution::Unresolved(_) => {
                            return Err(Halt::Indeterminate(format!(
                                "call to {} at {} is opaque",
                                callee,
                                frame.origin(&path)
                            )))
                        }
                    };

                    let mut params = BTreeMap::new();
                    for (param, arg) in target.params.iter().zip(args) {
                        let value = eval(arg, &frame.bindings, state).map_err(|halt| at(halt, frame, &path))?;
                        params.insert(param.name.clone(), value);
                    }
                    let mut callee_frame = Frame {
                        function: target,
                        bindings: Bindings {
                            params,
                            locals: BTreeMap::new(),
                        },
                        depth: frame.depth + 1,
                    };
                    let flow = self.exec(&target.body, None, &mut callee_frame, state, stop_at, budget)?;
                    if let Some(local) = returns {
                        match flow {
                            Flow::Returned(Some(value)) => {
                                frame.bindings.locals.insert(local.clone(), value);
                            }
                            _ => {
                                return Err(Halt::Indeterminate(format!(
                                    "{} returns no value to {}",
                                    callee, local
                                )))
                            }
                        }
                    }
                }
                Operation::Return { value } => {
                    let value = match value {
                        Some(expr) => Some(eval(expr, &frame.bindings, state).map_err(|halt| at(halt, frame, &path))?),
                        None => None,
                    };
                    return Ok(Flow::Returned(value));
                }
            }
        }
        Ok(Flow::Continue)
    }
}

fn eval(expr: &ValueExpr, scope: &Bindings, state: &AbstractState) -> Result<AbstractValue, Halt> {
    match expr {
        ValueExpr::Const(v) => Ok(AbstractValue::constant(*v)),
        ValueExpr::Param(name) => scope
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| Halt::Indeterminate(format!("no argument for {}", name))),
        ValueExpr::Local(name) => scope
            .locals
            .get(name)
            .cloned()
            .ok_or_else(|| Halt::Indeterminate(format!("local %{} unbound", name))),
        ValueExpr::Storage(var) => Ok(state.get(var)),
        ValueExpr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, scope, state)?;
            let r = eval(rhs, scope, state)?;
            AbstractValue::apply(*op, &l, &r).map_err(|reason| Halt::Revert { reason, at: None })
        }
    }
}

fn eval_cond(cond: &CondExpr, scope: &Bindings, state: &AbstractState) -> Result<Option<bool>, Halt> {
    Ok(match cond {
        CondExpr::Bool(b) => Some(*b),
        CondExpr::Compare { op, lhs, rhs } => {
            let l = eval(lhs, scope, state)?;
            let r = eval(rhs, scope, state)?;
            AbstractValue::compare(*op, &l, &r)
        }
        CondExpr::And(a, b) => match eval_cond(a, scope, state)? {
            Some(false) => Some(false),
            first => match (first, eval_cond(b, scope, state)?) {
                (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
        },
        CondExpr::Or(a, b) => match eval_cond(a, scope, state)? {
            Some(true) => Some(true),
            first => match (first, eval_cond(b, scope, state)?) {
                (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
        },
        CondExpr::Not(inner) => eval_cond(inner, scope, state)?.map(|b| !b),
    })
}

/// Attach the operation being executed to an arithmetic revert
fn at(halt: Halt, frame: &Frame<'_>, path: &OpPath) -> Halt {
    match halt {
        Halt::Revert { reason, at: None } => Halt::Revert {
            reason,
            at: Some(frame.origin(path)),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::composition::domain::Seed;
    use crate::shared::models::{
        AccessControl, Contract, ExternalTarget, Param, ProgramModel, StorageVariable, VarId,
    };

    fn var(name: &str) -> StorageVariable {
        StorageVariable {
            id: format!("C.{}", name).into(),
            contract: "C".into(),
            slot: String::new(),
            ty: Default::default(),
            sensitivity: Default::default(),
        }
    }

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

    fn model(functions: Vec<Function>) -> ProgramModel {
        ProgramModel {
            contracts: vec![Contract {
                id: "C".into(),
                functions,
                variables: vec![var("a"), var("b")],
            }],
            roles: vec![],
        }
    }

    fn read(v: &str, bind: &str) -> Operation {
        Operation::StorageRead {
            var: format!("C.{}", v).into(),
            bind: Some(bind.to_string()),
        }
    }

    fn write(v: &str, value: ValueExpr) -> Operation {
        Operation::StorageWrite {
            var: format!("C.{}", v).into(),
            value,
        }
    }

    fn run(model: &ProgramModel, f: &str, args: &[(&str, i128)], state: AbstractState) -> Outcome {
        let index = model.index();
        let call_graph = InternalCallGraph::build(model);
        let sim = Simulator::new(&index, &call_graph, 4);
        let function = index.function(&format!("C.{}", f).into()).unwrap();
        let args: Vec<(String, i128)> = args.iter().map(|(n, v)| (n.to_string(), *v)).collect();
        sim.run(function, &args, state, None, &mut UnitBudget::unlimited())
            .unwrap()
    }

    #[test]
    fn test_concrete_write_and_return() {
        let model = model(vec![function(
            "add",
            vec![Param::amount("x")],
            vec![
                read("a", "a"),
                write("a", ValueExpr::local("a").add(ValueExpr::param("x"))),
                Operation::Return {
                    value: Some(ValueExpr::local("a")),
                },
            ],
        )]);
        match run(&model, "add", &[("x", 5)], AbstractState::new(Seed::Concrete(10))) {
            Outcome::Completed { state, returned } => {
                assert_eq!(state.get(&VarId::from("C.a")).as_const(), Some(15));
                assert_eq!(returned.and_then(|v| v.as_const()), Some(10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unsigned_underflow_reverts() {
        let model = model(vec![function(
            "take",
            vec![Param::amount("x")],
            vec![
                read("a", "a"),
                write("a", ValueExpr::local("a").sub(ValueExpr::param("x"))),
            ],
        )]);
        let outcome = run(&model, "take", &[("x", 11)], AbstractState::new(Seed::Concrete(10)));
        assert_eq!(outcome.kind(), "reverted");
    }

    #[test]
    fn test_symbolic_branch_is_indeterminate() {
        let model = model(vec![function(
            "f",
            vec![],
            vec![
                read("a", "a"),
                Operation::Branch {
                    cond: CondExpr::eq(ValueExpr::local("a"), ValueExpr::constant(0)),
                    then_ops: vec![],
                    else_ops: vec![],
                },
            ],
        )]);
        let outcome = run(&model, "f", &[], AbstractState::new(Seed::Symbolic));
        assert_eq!(outcome.kind(), "indeterminate");
    }

    #[test]
    fn test_inlined_helper_and_suspension() {
        let mut helper = function(
            "_half",
            vec![Param::new("v")],
            vec![Operation::Return {
                value: Some(ValueExpr::param("v").div(ValueExpr::constant(2))),
            }],
        );
        helper.access = AccessControl::InternalOnly;
        let model = model(vec![
            function(
                "f",
                vec![Param::amount("x")],
                vec![
                    Operation::InternalCall {
                        callee: "C._half".into(),
                        args: vec![ValueExpr::param("x")],
                        returns: Some("h".to_string()),
                    },
                    write("a", ValueExpr::local("h")),
                    Operation::ExternalCall {
                        target: ExternalTarget::new("token"),
                        calldata: Default::default(),
                        returns: None,
                    },
                    write("b", ValueExpr::local("h")),
                ],
            ),
            helper,
        ]);
        let index = model.index();
        let call_graph = InternalCallGraph::build(&model);
        let sim = Simulator::new(&index, &call_graph, 4);
        let f = index.function(&"C.f".into()).unwrap();
        let anchor = OpRef::new("C.f".into(), OpPath::root(2));
        let outcome = sim
            .run(
                f,
                &[("x".to_string(), 9)],
                AbstractState::new(Seed::Concrete(0)),
                Some(&anchor),
                &mut UnitBudget::unlimited(),
            )
            .unwrap();
        match outcome {
            Outcome::Suspended { state } => {
                assert_eq!(state.get(&VarId::from("C.a")).as_const(), Some(4));
                assert_eq!(state.get(&VarId::from("C.b")).as_const(), Some(0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

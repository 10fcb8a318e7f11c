//! Bounded trace enumeration
//!
//! Depth-first over branch decisions, then-arm first. Internal calls are
//! inlined under the same rules as the dependency graph; opaque calls become
//! `Opaque` steps carrying the widened write set. Past `max_traces` the
//! remaining traces are not enumerated: a single merged trace that flattens
//! every arm in program order stands in for them, so no write that could
//! follow a call is lost from its pending set.

use crate::features::dependency_graph::{CallResolution, InternalCallGraph};
use crate::features::dependency_graph::infrastructure::widening_set;
use crate::features::window_analysis::domain::{StepKind, Trace, TraceSet, TraceStep};
use crate::shared::budget::{BudgetExhausted, UnitBudget};
use crate::shared::models::{Arm, Function, ModelIndex, OpPath, OpRef, Operation};
use tracing::debug;

#[derive(Debug, Clone)]
struct Frame<'a> {
    function: &'a Function,
    ops: &'a [Operation],
    /// Branch holding `ops`, `None` for a function body
    parent: Option<(OpPath, Arm)>,
    next: usize,
    invocation: usize,
    depth: usize,
}

impl Frame<'_> {
    fn path(&self, index: usize) -> OpPath {
        match &self.parent {
            None => OpPath::root(index as u32),
            Some((branch, arm)) => branch.child(*arm, index as u32),
        }
    }
}

#[derive(Debug, Clone)]
struct Partial<'a> {
    steps: Vec<TraceStep>,
    stack: Vec<Frame<'a>>,
}

enum Advance<'a> {
    Done(Vec<TraceStep>),
    Fork(Partial<'a>, Partial<'a>),
}

pub struct TraceEnumerator<'a> {
    index: &'a ModelIndex<'a>,
    call_graph: &'a InternalCallGraph,
    max_depth: usize,
    max_traces: usize,
    next_invocation: usize,
}

impl<'a> TraceEnumerator<'a> {
    pub fn new(
        index: &'a ModelIndex<'a>,
        call_graph: &'a InternalCallGraph,
        max_depth: usize,
        max_traces: usize,
    ) -> Self {
        Self {
            index,
            call_graph,
            max_depth,
            max_traces,
            next_invocation: 1,
        }
    }

    /// Enumerate traces of `function`
    pub fn enumerate(&mut self, function: &'a Function, budget: &mut UnitBudget) -> TraceSet {
        let mut set = TraceSet::default();
        let mut worklist = vec![Partial {
            steps: Vec::new(),
            stack: vec![Frame {
                function,
                ops: &function.body,
                parent: None,
                next: 0,
                invocation: 0,
                depth: 0,
            }],
        }];

        while let Some(partial) = worklist.pop() {
            if set.traces.len() >= self.max_traces {
                set.overflow = true;
                break;
            }
            match self.advance(function, partial, budget) {
                Ok(Advance::Done(steps)) => set.traces.push(Trace {
                    steps,
                    merged: false,
                }),
                Ok(Advance::Fork(then_arm, else_arm)) => {
                    worklist.push(else_arm);
                    worklist.push(then_arm);
                }
                Err(exhausted) => {
                    debug!("{}: trace enumeration stopped: {}", function.id, exhausted);
                    set.truncated = true;
                    break;
                }
            }
        }

        if set.overflow || set.truncated {
            // The merged trace covers whatever enumeration left out.
            let mut steps = Vec::new();
            self.flatten(function, function, &function.body, None, 0, &mut steps);
            set.traces.push(Trace {
                steps,
                merged: true,
            });
        }
        set
    }

    fn advance(
        &mut self,
        root: &'a Function,
        mut partial: Partial<'a>,
        budget: &mut UnitBudget,
    ) -> Result<Advance<'a>, BudgetExhausted> {
        loop {
            let Some(frame) = partial.stack.last_mut() else {
                return Ok(Advance::Done(partial.steps));
            };
            if frame.next >= frame.ops.len() {
                partial.stack.pop();
                continue;
            }

            budget.tick()?;
            let index = frame.next;
            frame.next += 1;
            let ops = frame.ops;
            let op = &ops[index];
            let path = frame.path(index);
            let function = frame.function;
            let invocation = frame.invocation;
            let depth = frame.depth;
            let origin = OpRef::new(function.id.clone(), path.clone());

            match op {
                Operation::StorageRead { var, .. } => partial.steps.push(TraceStep {
                    kind: StepKind::Read(var.clone()),
                    origin,
                    depth,
                }),
                Operation::StorageWrite { var, .. } => partial.steps.push(TraceStep {
                    kind: StepKind::Write(var.clone()),
                    origin,
                    depth,
                }),
                Operation::ExternalCall { .. } => partial.steps.push(TraceStep {
                    kind: StepKind::ExternalCall,
                    origin,
                    depth,
                }),
                Operation::CallbackPoint { triggered_by } => partial.steps.push(TraceStep {
                    kind: StepKind::Callback {
                        triggered_by: OpRef::new(function.id.clone(), triggered_by.clone()),
                    },
                    origin,
                    depth,
                }),
                Operation::Branch {
                    then_ops, else_ops, ..
                } => {
                    let mut then_arm = partial.clone();
                    then_arm.stack.push(Frame {
                        function,
                        ops: then_ops,
                        parent: Some((path.clone(), Arm::Then)),
                        next: 0,
                        invocation,
                        depth,
                    });
                    let mut else_arm = partial;
                    else_arm.stack.push(Frame {
                        function,
                        ops: else_ops,
                        parent: Some((path, Arm::Else)),
                        next: 0,
                        invocation,
                        depth,
                    });
                    return Ok(Advance::Fork(then_arm, else_arm));
                }
                Operation::Require { .. } => {}
                Operation::InternalCall { callee, .. } => {
                    match self
                        .call_graph
                        .resolve(self.index, function, callee, depth, self.max_depth)
                    {
                        CallResolution::Inline(target) => {
                            let invocation = self.next_invocation;
                            self.next_invocation += 1;
                            partial.stack.push(Frame {
                                function: target,
                                ops: &target.body,
                                parent: None,
                                next: 0,
                                invocation,
                                depth: depth + 1,
                            });
                        }
                        CallResolution::Recursive | CallResolution::Unresolved(_) => {
                            partial.steps.push(TraceStep {
                                kind: StepKind::Opaque {
                                    callee: callee.clone(),
                                    may_write: widening_set(self.index, &root.contract, callee),
                                },
                                origin,
                                depth,
                            });
                        }
                    }
                }
                Operation::Return { .. } => {
                    while partial
                        .stack
                        .last()
                        .is_some_and(|f| f.invocation == invocation)
                    {
                        partial.stack.pop();
                    }
                }
            }
        }
    }

    /// Every operation in program order, both arms of every branch, returns
    /// ignored.
    fn flatten(
        &self,
        root: &'a Function,
        function: &'a Function,
        ops: &'a [Operation],
        parent: Option<(OpPath, Arm)>,
        depth: usize,
        steps: &mut Vec<TraceStep>,
    ) {
        for (index, op) in ops.iter().enumerate() {
            let path = match &parent {
                None => OpPath::root(index as u32),
                Some((branch, arm)) => branch.child(*arm, index as u32),
            };
            let origin = OpRef::new(function.id.clone(), path.clone());
            let kind = match op {
                Operation::StorageRead { var, .. } => StepKind::Read(var.clone()),
                Operation::StorageWrite { var, .. } => StepKind::Write(var.clone()),
                Operation::ExternalCall { .. } => StepKind::ExternalCall,
                Operation::CallbackPoint { triggered_by } => StepKind::Callback {
                    triggered_by: OpRef::new(function.id.clone(), triggered_by.clone()),
                },
                Operation::Branch {
                    then_ops, else_ops, ..
                } => {
                    self.flatten(
                        root,
                        function,
                        then_ops,
                        Some((path.clone(), Arm::Then)),
                        depth,
                        steps,
                    );
                    self.flatten(root, function, else_ops, Some((path, Arm::Else)), depth, steps);
                    continue;
                }
                Operation::InternalCall { callee, .. } => {
                    match self
                        .call_graph
                        .resolve(self.index, function, callee, depth, self.max_depth)
                    {
                        CallResolution::Inline(target) => {
                            self.flatten(root, target, &target.body, None, depth + 1, steps);
                            continue;
                        }
                        CallResolution::Recursive | CallResolution::Unresolved(_) => {
                            StepKind::Opaque {
                                callee: callee.clone(),
                                may_write: widening_set(self.index, &root.contract, callee),
                            }
                        }
                    }
                }
                Operation::Require { .. } | Operation::Return { .. } => continue,
            };
            steps.push(TraceStep {
                kind,
                origin,
                depth,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{
        AccessControl, CondExpr, Contract, ExternalTarget, ProgramModel, StorageVariable,
        ValueExpr, VarId,
    };

    fn write(v: &str) -> Operation {
        Operation::StorageWrite {
            var: format!("C.{}", v).into(),
            value: ValueExpr::constant(1),
        }
    }

    fn branch(then_ops: Vec<Operation>, else_ops: Vec<Operation>) -> Operation {
        Operation::Branch {
            cond: CondExpr::Bool(true),
            then_ops,
            else_ops,
        }
    }

    fn external_call() -> Operation {
        Operation::ExternalCall {
            target: ExternalTarget::new("token"),
            calldata: Default::default(),
            returns: None,
        }
    }

    fn model(body: Vec<Operation>) -> ProgramModel {
        ProgramModel {
            contracts: vec![Contract {
                id: "C".into(),
                functions: vec![Function {
                    id: "C.f".into(),
                    contract: "C".into(),
                    access: AccessControl::Unrestricted,
                    external: true,
                    view: false,
                    reentrancy_guard: None,
                    params: vec![],
                    preconditions: vec![],
                    body,
                }],
                variables: ["a", "b", "c"]
                    .iter()
                    .map(|v| StorageVariable {
                        id: format!("C.{}", v).into(),
                        contract: "C".into(),
                        slot: String::new(),
                        ty: Default::default(),
                        sensitivity: Default::default(),
                    })
                    .collect(),
            }],
            roles: vec![],
        }
    }

    fn enumerate(model: &ProgramModel, max_traces: usize) -> TraceSet {
        let index = model.index();
        let call_graph = InternalCallGraph::build(model);
        let function = index.function(&"C.f".into()).unwrap();
        let mut enumerator = TraceEnumerator::new(&index, &call_graph, 4, max_traces);
        enumerator.enumerate(function, &mut UnitBudget::unlimited())
    }

    #[test]
    fn test_branches_fork_traces() {
        let model = model(vec![
            branch(vec![write("a")], vec![write("b")]),
            branch(vec![write("c")], vec![]),
        ]);
        let set = enumerate(&model, 64);
        assert_eq!(set.traces.len(), 4);
        assert!(!set.overflow);
        // then-arm first
        assert_eq!(
            set.traces[0].writes_in(0..set.traces[0].steps.len()),
            [VarId::from("C.a"), VarId::from("C.c")]
                .into_iter()
                .collect::<std::collections::BTreeSet<_>>()
        );
    }

    #[test]
    fn test_return_ends_trace() {
        let model = model(vec![
            branch(vec![Operation::Return { value: None }], vec![]),
            write("a"),
        ]);
        let set = enumerate(&model, 64);
        assert_eq!(set.traces.len(), 2);
        assert!(set.traces[0].steps.is_empty());
        assert_eq!(set.traces[1].steps.len(), 1);
    }

    #[test]
    fn test_overflow_appends_merged_trace() {
        let model = model(vec![
            branch(vec![write("a")], vec![]),
            external_call(),
            branch(vec![write("b")], vec![write("c")]),
        ]);
        let set = enumerate(&model, 2);
        assert!(set.overflow);
        assert_eq!(set.traces.len(), 3);
        let merged = set.traces.last().unwrap();
        assert!(merged.merged);
        let all = merged.writes_in(0..merged.steps.len());
        assert_eq!(all.len(), 3);
    }
}

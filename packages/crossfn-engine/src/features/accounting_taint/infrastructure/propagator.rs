//! Taint propagation over one function body
//!
//! Locals bound to the return of a mutable external call are sources. Taint
//! flows through arithmetic, into inlined callees via their parameters and
//! back through their return values. Branch arms are walked on copies of the
//! local map and joined afterwards. Storage reads produce clean values.
//!
//! A guard comparing two independent sources clears them for the rest of the
//! path it sits on. After a branch only sources cleared on both arms stay
//! cleared, so a check on one arm never covers a write the other arm reaches.

use crate::features::accounting_taint::domain::{GuardCheck, Taint, TaintSource, TaintSummary, TaintedWrite};
use crate::features::dependency_graph::{CallResolution, InternalCallGraph};
use crate::shared::models::{Arm, Function, ModelIndex, OpPath, OpRef, Operation, ValueExpr};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
struct Scope {
    params: BTreeMap<String, Taint>,
    locals: BTreeMap<String, Taint>,
    /// Sources cross-checked on the current path
    cleared: BTreeSet<TaintSource>,
}

impl Scope {
    fn join(&mut self, then_scope: &Scope, else_scope: &Scope) {
        for other in [then_scope, else_scope] {
            for (name, taint) in &other.locals {
                self.locals.entry(name.clone()).or_default().merge(taint);
            }
        }
        self.cleared = then_scope
            .cleared
            .intersection(&else_scope.cleared)
            .cloned()
            .collect();
    }

    fn taint_of(&self, expr: &ValueExpr) -> Taint {
        let mut taint = Taint::default();
        expr.visit(&mut |leaf| {
            let found = match leaf {
                ValueExpr::Param(name) => self.params.get(name),
                ValueExpr::Local(name) => self.locals.get(name),
                _ => None,
            };
            if let Some(found) = found {
                taint.merge(found);
            }
        });
        if matches!(expr, ValueExpr::Binary { .. }) {
            taint.then(format!("expression {}", expr))
        } else {
            taint
        }
    }
}

pub struct TaintPropagator<'a> {
    index: &'a ModelIndex<'a>,
    call_graph: &'a InternalCallGraph,
    max_depth: usize,
    summary: TaintSummary,
}

impl<'a> TaintPropagator<'a> {
    pub fn new(index: &'a ModelIndex<'a>, call_graph: &'a InternalCallGraph, max_depth: usize) -> Self {
        Self {
            index,
            call_graph,
            max_depth,
            summary: TaintSummary::default(),
        }
    }

    /// Propagate through `function` with clean parameters
    pub fn run(mut self, function: &'a Function) -> TaintSummary {
        let mut scope = Scope::default();
        self.walk(function, &function.body, None, &mut scope, 0);
        self.summary
    }

    /// Walk `ops`; returns the taint of a `Return` reached on this path
    fn walk(
        &mut self,
        function: &'a Function,
        ops: &'a [Operation],
        parent: Option<(&OpPath, Arm)>,
        scope: &mut Scope,
        depth: usize,
    ) -> Option<Taint> {
        let mut returned: Option<Taint> = None;
        for (i, op) in ops.iter().enumerate() {
            let path = match parent {
                None => OpPath::root(i as u32),
                Some((branch, arm)) => branch.child(arm, i as u32),
            };
            let at = OpRef::new(function.id.clone(), path.clone());

            match op {
                Operation::StorageRead { bind: Some(local), .. } => {
                    scope.locals.insert(local.clone(), Taint::default());
                }
                Operation::StorageRead { bind: None, .. } | Operation::CallbackPoint { .. } => {}
                Operation::StorageWrite { var, value } => {
                    let taint = scope.taint_of(value);
                    if !taint.is_clean() {
                        let cleared = taint.sources.intersection(&scope.cleared).cloned().collect();
                        let taint = taint.then(format!("write {} at {}", var, at));
                        self.summary.writes.push(TaintedWrite {
                            var: var.clone(),
                            at,
                            taint,
                            cleared,
                        });
                    }
                }
                Operation::ExternalCall {
                    target,
                    returns: Some(local),
                    ..
                } => {
                    let taint = if target.immutable {
                        Taint::default()
                    } else {
                        Taint::source(TaintSource {
                            call: at,
                            target: target.label.clone(),
                        })
                    };
                    scope.locals.insert(local.clone(), taint);
                }
                Operation::ExternalCall { returns: None, .. } => {}
                Operation::Require { cond } => {
                    for (_, lhs, rhs) in cond.comparisons() {
                        let guard = GuardCheck {
                            at: at.clone(),
                            lhs: scope.taint_of(lhs),
                            rhs: scope.taint_of(rhs),
                        };
                        if guard.corroborates() {
                            scope.cleared.extend(guard.lhs.sources.iter().cloned());
                            scope.cleared.extend(guard.rhs.sources.iter().cloned());
                        }
                        self.summary.guards.push(guard);
                    }
                }
                Operation::Branch {
                    then_ops, else_ops, ..
                } => {
                    let mut then_scope = scope.clone();
                    let mut else_scope = scope.clone();
                    let t = self.walk(function, then_ops, Some((&path, Arm::Then)), &mut then_scope, depth);
                    let e = self.walk(function, else_ops, Some((&path, Arm::Else)), &mut else_scope, depth);
                    scope.join(&then_scope, &else_scope);
                    for arm in [t, e].into_iter().flatten() {
                        returned.get_or_insert_with(Taint::default).merge(&arm);
                    }
                }
                Operation::InternalCall {
                    callee,
                    args,
                    returns,
                } => {
                    let arg_taints: Vec<Taint> = args.iter().map(|a| scope.taint_of(a)).collect();
                    let result = match self
                        .call_graph
                        .resolve(self.index, function, callee, depth, self.max_depth)
                    {
                        CallResolution::Inline(target) => {
                            let mut callee_scope = Scope {
                                cleared: scope.cleared.clone(),
                                ..Scope::default()
                            };
                            for (param, taint) in target.params.iter().zip(&arg_taints) {
                                callee_scope.params.insert(param.name.clone(), taint.clone());
                            }
                            let returned = self
                                .walk(target, &target.body, None, &mut callee_scope, depth + 1)
                                .unwrap_or_default();
                            scope.cleared = callee_scope.cleared;
                            returned
                        }
                        // Opaque: the result may carry any argument's taint
                        CallResolution::Recursive | CallResolution::Unresolved(_) => {
                            let mut joined = Taint::default();
                            for taint in &arg_taints {
                                joined.merge(taint);
                            }
                            joined
                        }
                    };
                    if let Some(local) = returns {
                        let result = result.then(format!("{} returns to %{}", callee, local));
                        scope.locals.insert(local.clone(), result);
                    }
                }
                Operation::Return { value } => {
                    let taint = value.as_ref().map(|v| scope.taint_of(v)).unwrap_or_default();
                    returned.get_or_insert_with(Taint::default).merge(&taint);
                    return returned;
                }
            }
        }
        returned
    }
}

//! Invariants derived from in-body guards
//!
//! A `Require` whose operands are all locals bound by `StorageRead` (and
//! constants) states a relation between storage variables that the protocol
//! relies on. Rewriting those locals to `Storage(var)` yields an invariant the
//! sequence search can target like an explicit one.

use crate::shared::models::{
    Arm, CondExpr, Function, Invariant, OpPath, OpRef, Operation, ProgramModel, ValueExpr, VarId,
};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::debug;

/// Derived invariants, deduplicated against `explicit` and each other
pub fn derive_invariants(model: &ProgramModel, explicit: &[Invariant]) -> Vec<Invariant> {
    let mut seen: BTreeSet<String> = explicit.iter().map(|i| i.expr.to_string()).collect();
    let mut derived = Vec::new();

    for function in model.functions() {
        let mut bindings: FxHashMap<&str, Option<&VarId>> = FxHashMap::default();
        scan(function, &function.body, None, &mut bindings, &mut |path, cond, bindings| {
            let Some(expr) = rewrite(cond, bindings) else {
                return;
            };
            if seen.insert(expr.to_string()) {
                let from = OpRef::new(function.id.clone(), path.clone());
                derived.push(Invariant::derived(format!("guard@{}", from), expr, from));
            }
        });
    }

    debug!("derived {} invariants from guards", derived.len());
    derived
}

type Bindings<'a> = FxHashMap<&'a str, Option<&'a VarId>>;

/// Program-order walk tracking which locals hold an unmodified storage value
fn scan<'a>(
    function: &'a Function,
    ops: &'a [Operation],
    parent: Option<(&OpPath, Arm)>,
    bindings: &mut Bindings<'a>,
    on_require: &mut impl FnMut(&OpPath, &'a CondExpr, &Bindings<'a>),
) {
    for (i, op) in ops.iter().enumerate() {
        let path = match parent {
            None => OpPath::root(i as u32),
            Some((branch, arm)) => branch.child(arm, i as u32),
        };
        match op {
            Operation::StorageRead {
                var,
                bind: Some(local),
            } => {
                bindings.insert(local.as_str(), Some(var));
            }
            Operation::ExternalCall {
                returns: Some(local),
                ..
            }
            | Operation::InternalCall {
                returns: Some(local),
                ..
            } => {
                bindings.insert(local.as_str(), None);
            }
            Operation::Branch {
                then_ops, else_ops, ..
            } => {
                let mut then_bindings = bindings.clone();
                scan(
                    function,
                    then_ops,
                    Some((&path, Arm::Then)),
                    &mut then_bindings,
                    on_require,
                );
                let mut else_bindings = bindings.clone();
                scan(
                    function,
                    else_ops,
                    Some((&path, Arm::Else)),
                    &mut else_bindings,
                    on_require,
                );
            }
            Operation::Require { cond } => on_require(&path, cond, bindings),
            _ => {}
        }
    }
}

/// Storage-only form of `cond`, if it has one
fn rewrite(cond: &CondExpr, bindings: &Bindings<'_>) -> Option<CondExpr> {
    if !cond.params().is_empty() {
        return None;
    }
    let locals = cond.locals();
    if locals.is_empty() {
        return None;
    }
    for local in &locals {
        bindings.get(local).copied().flatten()?;
    }
    Some(cond.map_leaves(&|leaf| match leaf {
        ValueExpr::Local(name) => bindings
            .get(name.as_str())
            .copied()
            .flatten()
            .map(|var| ValueExpr::Storage(var.clone())),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{AccessControl, Contract};

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
                variables: vec![],
            }],
            roles: vec![],
        }
    }

    fn read(var: &str, bind: &str) -> Operation {
        Operation::StorageRead {
            var: var.into(),
            bind: Some(bind.to_string()),
        }
    }

    #[test]
    fn test_storage_guard_becomes_invariant() {
        let model = model(vec![
            read("C.assets", "a"),
            read("C.debt", "d"),
            Operation::Require {
                cond: CondExpr::ge(ValueExpr::local("a"), ValueExpr::local("d")),
            },
        ]);
        let derived = derive_invariants(&model, &[]);
        assert_eq!(derived.len(), 1);
        assert!(derived[0].is_derived());
        assert_eq!(
            derived[0].expr,
            CondExpr::ge(ValueExpr::storage("C.assets"), ValueExpr::storage("C.debt"))
        );
    }

    #[test]
    fn test_param_guards_and_duplicates_are_skipped() {
        let model = model(vec![
            read("C.cap", "c"),
            Operation::Require {
                cond: CondExpr::le(ValueExpr::param("x"), ValueExpr::local("c")),
            },
            read("C.assets", "a"),
            Operation::Require {
                cond: CondExpr::gt(ValueExpr::local("a"), ValueExpr::constant(0)),
            },
        ]);
        let explicit = vec![Invariant::explicit(
            "nonzero",
            CondExpr::gt(ValueExpr::storage("C.assets"), ValueExpr::constant(0)),
        )];
        assert!(derive_invariants(&model, &explicit).is_empty());
    }
}

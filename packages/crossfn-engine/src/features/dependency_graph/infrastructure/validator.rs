//! Model validation
//!
//! Runs before the dependency graph is built. Dangling references (undeclared
//! variables, functions, callback anchors) are collected across the whole
//! input and reported together as one `ModelInconsistency`; structural
//! problems are reported as `MalformedModel`.

use crate::errors::{EngineError, Result};
use crate::shared::models::{
    op_at, walk_body, AccessControl, AnalysisInput, CondExpr, Function, FunctionId, Operation,
    ValueExpr, VarId,
};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub struct ModelValidator;

#[derive(Default)]
struct Report {
    dangling: Vec<(String, String)>,
    malformed: Vec<String>,
}

impl ModelValidator {
    /// Validate an analysis input
    pub fn validate(input: &AnalysisInput) -> Result<()> {
        let mut report = Report::default();
        let model = &input.model;

        let mut function_ids = FxHashSet::default();
        let mut var_ids = FxHashSet::default();
        for contract in &model.contracts {
            for var in &contract.variables {
                if var.contract != contract.id {
                    report.malformed.push(format!(
                        "variable {} declared in {} claims contract {}",
                        var.id, contract.id, var.contract
                    ));
                }
                if !var_ids.insert(&var.id) {
                    report.malformed.push(format!("duplicate variable {}", var.id));
                }
            }
            for function in &contract.functions {
                if function.contract != contract.id {
                    report.malformed.push(format!(
                        "function {} declared in {} claims contract {}",
                        function.id, contract.id, function.contract
                    ));
                }
                if !function_ids.insert(&function.id) {
                    report.malformed.push(format!("duplicate function {}", function.id));
                }
            }
        }

        let declared_roles: BTreeSet<&str> = model.roles.iter().map(|r| r.name.as_str()).collect();

        for function in model.functions() {
            if let AccessControl::Permissioned(role) = &function.access {
                if !declared_roles.contains(role.as_str()) {
                    debug!(
                        "{} uses undeclared role '{}'; treated as restricted",
                        function.id, role
                    );
                }
            }
            check_function(function, &function_ids, &var_ids, &mut report);
        }

        for invariant in &input.invariants {
            let context = format!("invariant '{}'", invariant.name);
            check_declarative_cond(&invariant.expr, &context, &var_ids, &mut report);
            if !invariant.expr.locals().is_empty() || !invariant.expr.params().is_empty() {
                report
                    .malformed
                    .push(format!("{} may only reference storage and constants", context));
            }
        }

        for probe in &input.probes {
            let context = format!("probe '{}'", probe.name);
            check_declarative_value(&probe.expr, &context, &var_ids, &mut report);
            if !probe.expr.locals().is_empty() || !probe.expr.params().is_empty() {
                report
                    .malformed
                    .push(format!("{} may only reference storage and constants", context));
            }
        }

        for var in input.initial_state.keys() {
            if !var_ids.contains(var) {
                report
                    .dangling
                    .push((var.to_string(), "initial state".to_string()));
            }
        }

        report.into_result()
    }
}

impl Report {
    fn into_result(self) -> Result<()> {
        if let Some((reference, context)) = self.dangling.first().cloned() {
            warn!(
                "model has {} unresolved reference(s), first: {} in {}",
                self.dangling.len(),
                reference,
                context
            );
            return Err(EngineError::ModelInconsistency {
                reference,
                context,
                unresolved: self
                    .dangling
                    .iter()
                    .map(|(r, c)| format!("{} ({})", r, c))
                    .collect(),
            });
        }
        if !self.malformed.is_empty() {
            return Err(EngineError::malformed(self.malformed.join("; ")));
        }
        Ok(())
    }
}

fn check_function(
    function: &Function,
    function_ids: &FxHashSet<&FunctionId>,
    var_ids: &FxHashSet<&VarId>,
    report: &mut Report,
) {
    let params: BTreeSet<&str> = function.params.iter().map(|p| p.name.as_str()).collect();

    // Locals are bound flow-insensitively: any binding in the body counts.
    let mut bound: BTreeSet<&str> = BTreeSet::new();
    walk_body(&function.body, &mut |_, op| match op {
        Operation::StorageRead {
            bind: Some(name), ..
        }
        | Operation::ExternalCall {
            returns: Some(name),
            ..
        }
        | Operation::InternalCall {
            returns: Some(name),
            ..
        } => {
            bound.insert(name.as_str());
        }
        _ => {}
    });

    for (i, cond) in function.preconditions.iter().enumerate() {
        let context = format!("{} precondition #{}", function.id, i);
        check_declarative_cond(cond, &context, var_ids, report);
        for param in cond.params() {
            if !params.contains(param) {
                report
                    .malformed
                    .push(format!("{} uses unknown parameter '{}'", context, param));
            }
        }
        if !cond.locals().is_empty() {
            report
                .malformed
                .push(format!("{} may not reference locals", context));
        }
    }

    walk_body(&function.body, &mut |path, op| {
        let context = format!("{}@{}", function.id, path);

        let mut exprs: Vec<&ValueExpr> = Vec::new();
        match op {
            Operation::StorageRead { var, .. } => {
                if !var_ids.contains(var) {
                    report.dangling.push((var.to_string(), context.clone()));
                }
            }
            Operation::StorageWrite { var, value } => {
                if !var_ids.contains(var) {
                    report.dangling.push((var.to_string(), context.clone()));
                }
                exprs.push(value);
            }
            Operation::ExternalCall { calldata, .. } => exprs.extend(calldata.args.iter()),
            Operation::CallbackPoint { triggered_by } => {
                let anchored = matches!(
                    op_at(&function.body, triggered_by),
                    Some(Operation::ExternalCall { .. })
                );
                if !anchored {
                    report.dangling.push((
                        format!("external call {}", triggered_by),
                        context.clone(),
                    ));
                }
            }
            Operation::Branch { cond, .. } | Operation::Require { cond } => {
                exprs.extend(cond.operands());
            }
            Operation::InternalCall { callee, args, .. } => {
                if !function_ids.contains(callee) {
                    report.dangling.push((callee.to_string(), context.clone()));
                }
                exprs.extend(args.iter());
            }
            Operation::Return { value } => exprs.extend(value.iter()),
        }

        for expr in exprs {
            if let Some(var) = expr.storage_refs().into_iter().next() {
                report.malformed.push(format!(
                    "{} reads {} directly; bodies must bind storage through a read",
                    context, var
                ));
            }
            for local in expr.locals() {
                if !bound.contains(local) {
                    report
                        .malformed
                        .push(format!("{} uses unbound local '{}'", context, local));
                }
            }
            for param in expr.params() {
                if !params.contains(param) {
                    report
                        .malformed
                        .push(format!("{} uses unknown parameter '{}'", context, param));
                }
            }
        }
    });
}

fn check_declarative_cond(
    cond: &CondExpr,
    context: &str,
    var_ids: &FxHashSet<&VarId>,
    report: &mut Report,
) {
    for var in cond.storage_refs() {
        if !var_ids.contains(var) {
            report.dangling.push((var.to_string(), context.to_string()));
        }
    }
}

fn check_declarative_value(
    expr: &ValueExpr,
    context: &str,
    var_ids: &FxHashSet<&VarId>,
    report: &mut Report,
) {
    for var in expr.storage_refs() {
        if !var_ids.contains(var) {
            report.dangling.push((var.to_string(), context.to_string()));
        }
    }
}

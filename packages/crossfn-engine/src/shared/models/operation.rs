//! Operations - the body of a function
//!
//! A function body is an ordered list of [`Operation`]s. Order is significant
//! and total; `Branch` nests two alternative lists. Every operation is
//! addressable through an [`OpPath`].

use super::expr::{CondExpr, ValueExpr};
use super::ids::{Arm, FunctionId, OpPath, VarId};
use serde::{Deserialize, Serialize};

/// Callee of an external call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalTarget {
    /// Human-readable target (`oracle`, `IERC20(asset)`, ...)
    pub label: String,

    /// Statically known to be immutable/constant (return values are trusted)
    #[serde(default)]
    pub immutable: bool,
}

impl ExternalTarget {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            immutable: false,
        }
    }

    pub fn immutable(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            immutable: true,
        }
    }
}

/// What is sent with an external call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Calldata {
    pub selector: String,
    #[serde(default)]
    pub args: Vec<ValueExpr>,
}

impl Calldata {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            args: Vec::new(),
        }
    }
}

/// One operation of a function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Read `var`, optionally binding the value to local `bind`
    StorageRead {
        var: VarId,
        #[serde(default)]
        bind: Option<String>,
    },

    StorageWrite { var: VarId, value: ValueExpr },

    /// Call into another contract; `returns` names the local bound to the
    /// return value when the caller uses it
    ExternalCall {
        target: ExternalTarget,
        #[serde(default)]
        calldata: Calldata,
        #[serde(default)]
        returns: Option<String>,
    },

    /// Point where control may re-enter the protocol, triggered by the
    /// external call at `triggered_by`
    CallbackPoint { triggered_by: OpPath },

    Branch {
        cond: CondExpr,
        #[serde(default)]
        then_ops: Vec<Operation>,
        #[serde(default)]
        else_ops: Vec<Operation>,
    },

    /// Guard; the transaction reverts when `cond` is false
    Require { cond: CondExpr },

    /// Call to another function (inlined within the same contract)
    InternalCall {
        callee: FunctionId,
        #[serde(default)]
        args: Vec<ValueExpr>,
        #[serde(default)]
        returns: Option<String>,
    },

    Return {
        #[serde(default)]
        value: Option<ValueExpr>,
    },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::StorageRead { .. } => "storage_read",
            Operation::StorageWrite { .. } => "storage_write",
            Operation::ExternalCall { .. } => "external_call",
            Operation::CallbackPoint { .. } => "callback_point",
            Operation::Branch { .. } => "branch",
            Operation::Require { .. } => "require",
            Operation::InternalCall { .. } => "internal_call",
            Operation::Return { .. } => "return",
        }
    }

    /// Storage variable touched by a read or write
    pub fn storage_var(&self) -> Option<&VarId> {
        match self {
            Operation::StorageRead { var, .. } | Operation::StorageWrite { var, .. } => Some(var),
            _ => None,
        }
    }
}

/// Visit every operation of `body` exactly once, in program order.
///
/// Branch operations are visited before their arms; the then-arm before the
/// else-arm.
pub fn walk_body<'a>(body: &'a [Operation], f: &mut impl FnMut(&OpPath, &'a Operation)) {
    for (index, op) in body.iter().enumerate() {
        walk_op(OpPath::root(index as u32), op, f);
    }
}

fn walk_op<'a>(path: OpPath, op: &'a Operation, f: &mut impl FnMut(&OpPath, &'a Operation)) {
    f(&path, op);
    if let Operation::Branch {
        then_ops, else_ops, ..
    } = op
    {
        for (index, child) in then_ops.iter().enumerate() {
            walk_op(path.child(Arm::Then, index as u32), child, f);
        }
        for (index, child) in else_ops.iter().enumerate() {
            walk_op(path.child(Arm::Else, index as u32), child, f);
        }
    }
}

/// Look up the operation at `path`
pub fn op_at<'a>(body: &'a [Operation], path: &OpPath) -> Option<&'a Operation> {
    let mut found = None;
    walk_body(body, &mut |p, op| {
        if p == path {
            found = Some(op);
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> Vec<Operation> {
        vec![
            Operation::StorageRead {
                var: "V.a".into(),
                bind: Some("a".into()),
            },
            Operation::Branch {
                cond: CondExpr::Bool(true),
                then_ops: vec![Operation::StorageWrite {
                    var: "V.a".into(),
                    value: ValueExpr::constant(1),
                }],
                else_ops: vec![Operation::Return { value: None }],
            },
            Operation::Return { value: None },
        ]
    }

    #[test]
    fn test_walk_visits_each_operation_once() {
        let body = sample_body();
        let mut paths = Vec::new();
        walk_body(&body, &mut |path, _| paths.push(path.to_string()));
        assert_eq!(paths, vec!["0", "1", "1.then.0", "1.else.0", "2"]);
    }

    #[test]
    fn test_op_at() {
        let body = sample_body();
        let path = OpPath::root(1).child(Arm::Then, 0);
        assert_eq!(op_at(&body, &path).map(|op| op.kind()), Some("storage_write"));
        assert!(op_at(&body, &OpPath::root(9)).is_none());
    }
}

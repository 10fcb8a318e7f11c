//! Non-fatal conditions raised during a run
//!
//! Every diagnostic ends up in the run summary; none is dropped.

use super::ids::{FunctionId, OpPath};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an internal call could not be inlined
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvedReason {
    /// Inlining depth exhausted
    DepthExceeded,
    /// Callee belongs to another contract
    CrossContract,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    UnresolvedInternalCall {
        caller: FunctionId,
        callee: FunctionId,
        op: OpPath,
        reason: UnresolvedReason,
    },
    RecursiveCall {
        caller: FunctionId,
        callee: FunctionId,
    },
    TraceOverflow {
        function: FunctionId,
        bound: usize,
    },
    BudgetExceeded {
        unit: String,
        steps: u64,
        elapsed_ms: u64,
    },
    Indeterminate {
        unit: String,
        reason: String,
    },
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::UnresolvedInternalCall { .. } => "unresolved-internal-call",
            Diagnostic::RecursiveCall { .. } => "recursive-call",
            Diagnostic::TraceOverflow { .. } => "trace-overflow",
            Diagnostic::BudgetExceeded { .. } => "budget-exceeded",
            Diagnostic::Indeterminate { .. } => "indeterminate",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedInternalCall {
                caller,
                callee,
                op,
                reason,
            } => write!(
                f,
                "unresolved-internal-call: {}@{} -> {} ({:?}); relations widened",
                caller, op, callee, reason
            ),
            Diagnostic::RecursiveCall { caller, callee } => {
                write!(f, "recursive-call: {} -> {} treated as opaque", caller, callee)
            }
            Diagnostic::TraceOverflow { function, bound } => write!(
                f,
                "trace-overflow: {} has more than {} traces; remaining traces merged",
                function, bound
            ),
            Diagnostic::BudgetExceeded {
                unit,
                steps,
                elapsed_ms,
            } => write!(
                f,
                "budget-exceeded: {} after {} steps / {}ms",
                unit, steps, elapsed_ms
            ),
            Diagnostic::Indeterminate { unit, reason } => {
                write!(f, "indeterminate: {}: {}", unit, reason)
            }
        }
    }
}

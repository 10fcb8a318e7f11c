//! Invariants and value probes
//!
//! Both are declarative inputs: they may reference storage directly through
//! `ValueExpr::Storage`.

use super::expr::{CondExpr, ValueExpr};
use super::ids::{OpRef, VarId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where an invariant came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantOrigin {
    /// Declared alongside the program
    #[default]
    Explicit,
    /// Lifted from a storage-only `Require` guard
    Derived { from: OpRef },
}

/// Boolean property over storage assumed to hold between transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invariant {
    pub name: String,
    pub expr: CondExpr,
    #[serde(default)]
    pub origin: InvariantOrigin,
}

impl Invariant {
    pub fn explicit(name: impl Into<String>, expr: CondExpr) -> Self {
        Self {
            name: name.into(),
            expr,
            origin: InvariantOrigin::Explicit,
        }
    }

    pub fn derived(name: impl Into<String>, expr: CondExpr, from: OpRef) -> Self {
        Self {
            name: name.into(),
            expr,
            origin: InvariantOrigin::Derived { from },
        }
    }

    /// Storage variables the invariant talks about
    pub fn terms(&self) -> BTreeSet<VarId> {
        self.expr.storage_refs().into_iter().cloned().collect()
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.origin, InvariantOrigin::Derived { .. })
    }
}

/// Named storage expression whose value says who gained from an ordering
/// (share price, user balance, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueProbe {
    pub name: String,
    pub expr: ValueExpr,
}

impl ValueProbe {
    pub fn new(name: impl Into<String>, expr: ValueExpr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

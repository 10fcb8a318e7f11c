//! Value and condition expressions
//!
//! Expressions appear in three places:
//! - function bodies (write values, call arguments, `Require`/`Branch` guards),
//!   where storage is only reachable through locals bound by `StorageRead`;
//! - declarative inputs (invariants, preconditions, value probes), where
//!   `Storage(var)` denotes the current value of a variable;
//! - engine witnesses, rendered back to text.

use super::ids::VarId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Integer division rounding down (floor)
    Div,
    /// Integer division rounding up (ceil)
    DivUp,
    Min,
    Max,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::DivUp => "/^",
            BinOp::Min => "min",
            BinOp::Max => "max",
        }
    }
}

/// Integer-valued expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueExpr {
    Const(i128),
    /// Function parameter
    Param(String),
    /// Local bound by a `StorageRead`, `ExternalCall` or `InternalCall`
    Local(String),
    /// Current value of a storage variable (declarative expressions only)
    Storage(VarId),
    Binary {
        op: BinOp,
        lhs: Box<ValueExpr>,
        rhs: Box<ValueExpr>,
    },
}

impl ValueExpr {
    pub fn constant(value: i128) -> Self {
        ValueExpr::Const(value)
    }

    pub fn param(name: impl Into<String>) -> Self {
        ValueExpr::Param(name.into())
    }

    pub fn local(name: impl Into<String>) -> Self {
        ValueExpr::Local(name.into())
    }

    pub fn storage(var: impl Into<VarId>) -> Self {
        ValueExpr::Storage(var.into())
    }

    pub fn binary(op: BinOp, lhs: ValueExpr, rhs: ValueExpr) -> Self {
        ValueExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(self, rhs: ValueExpr) -> Self {
        Self::binary(BinOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: ValueExpr) -> Self {
        Self::binary(BinOp::Sub, self, rhs)
    }

    pub fn mul(self, rhs: ValueExpr) -> Self {
        Self::binary(BinOp::Mul, self, rhs)
    }

    pub fn div(self, rhs: ValueExpr) -> Self {
        Self::binary(BinOp::Div, self, rhs)
    }

    pub fn div_up(self, rhs: ValueExpr) -> Self {
        Self::binary(BinOp::DivUp, self, rhs)
    }

    /// Names of locals referenced by this expression
    pub fn locals(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.visit(&mut |expr| {
            if let ValueExpr::Local(name) = expr {
                out.insert(name.as_str());
            }
        });
        out
    }

    /// Names of parameters referenced by this expression
    pub fn params(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.visit(&mut |expr| {
            if let ValueExpr::Param(name) = expr {
                out.insert(name.as_str());
            }
        });
        out
    }

    /// Storage variables referenced directly by this expression
    pub fn storage_refs(&self) -> BTreeSet<&VarId> {
        let mut out = BTreeSet::new();
        self.visit(&mut |expr| {
            if let ValueExpr::Storage(var) = expr {
                out.insert(var);
            }
        });
        out
    }

    /// Pre-order visit of every sub-expression
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ValueExpr)) {
        f(self);
        if let ValueExpr::Binary { lhs, rhs, .. } = self {
            lhs.visit(f);
            rhs.visit(f);
        }
    }

    /// Rewrite leaves; used when inlining a callee into its caller's frame.
    pub fn map_leaves(&self, f: &impl Fn(&ValueExpr) -> Option<ValueExpr>) -> ValueExpr {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            ValueExpr::Binary { op, lhs, rhs } => {
                ValueExpr::binary(*op, lhs.map_leaves(f), rhs.map_leaves(f))
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Const(v) => write!(f, "{}", v),
            ValueExpr::Param(name) => write!(f, "{}", name),
            ValueExpr::Local(name) => write!(f, "%{}", name),
            ValueExpr::Storage(var) => write!(f, "{}", var),
            ValueExpr::Binary { op, lhs, rhs } => match op {
                BinOp::Min | BinOp::Max => write!(f, "{}({}, {})", op.symbol(), lhs, rhs),
                _ => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            },
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Neq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    pub fn holds(&self, lhs: i128, rhs: i128) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Neq => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

/// Boolean expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CondExpr {
    Bool(bool),
    Compare {
        op: CmpOp,
        lhs: ValueExpr,
        rhs: ValueExpr,
    },
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
    Not(Box<CondExpr>),
}

impl CondExpr {
    pub fn compare(op: CmpOp, lhs: ValueExpr, rhs: ValueExpr) -> Self {
        CondExpr::Compare { op, lhs, rhs }
    }

    pub fn ge(lhs: ValueExpr, rhs: ValueExpr) -> Self {
        Self::compare(CmpOp::Ge, lhs, rhs)
    }

    pub fn le(lhs: ValueExpr, rhs: ValueExpr) -> Self {
        Self::compare(CmpOp::Le, lhs, rhs)
    }

    pub fn gt(lhs: ValueExpr, rhs: ValueExpr) -> Self {
        Self::compare(CmpOp::Gt, lhs, rhs)
    }

    pub fn lt(lhs: ValueExpr, rhs: ValueExpr) -> Self {
        Self::compare(CmpOp::Lt, lhs, rhs)
    }

    pub fn eq(lhs: ValueExpr, rhs: ValueExpr) -> Self {
        Self::compare(CmpOp::Eq, lhs, rhs)
    }

    pub fn and(self, other: CondExpr) -> Self {
        CondExpr::And(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        CondExpr::Not(Box::new(self))
    }

    /// Every comparison leaf, in evaluation order
    pub fn comparisons(&self) -> Vec<(&CmpOp, &ValueExpr, &ValueExpr)> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<(&'a CmpOp, &'a ValueExpr, &'a ValueExpr)>) {
        match self {
            CondExpr::Bool(_) => {}
            CondExpr::Compare { op, lhs, rhs } => out.push((op, lhs, rhs)),
            CondExpr::And(a, b) | CondExpr::Or(a, b) => {
                a.collect_comparisons(out);
                b.collect_comparisons(out);
            }
            CondExpr::Not(inner) => inner.collect_comparisons(out),
        }
    }

    /// Every value expression mentioned by the condition
    pub fn operands(&self) -> Vec<&ValueExpr> {
        self.comparisons()
            .into_iter()
            .flat_map(|(_, lhs, rhs)| [lhs, rhs])
            .collect()
    }

    pub fn locals(&self) -> BTreeSet<&str> {
        self.operands().into_iter().flat_map(|e| e.locals()).collect()
    }

    pub fn params(&self) -> BTreeSet<&str> {
        self.operands().into_iter().flat_map(|e| e.params()).collect()
    }

    pub fn storage_refs(&self) -> BTreeSet<&VarId> {
        self.operands()
            .into_iter()
            .flat_map(|e| e.storage_refs())
            .collect()
    }

    pub fn map_leaves(&self, f: &impl Fn(&ValueExpr) -> Option<ValueExpr>) -> CondExpr {
        match self {
            CondExpr::Bool(b) => CondExpr::Bool(*b),
            CondExpr::Compare { op, lhs, rhs } => CondExpr::Compare {
                op: *op,
                lhs: lhs.map_leaves(f),
                rhs: rhs.map_leaves(f),
            },
            CondExpr::And(a, b) => CondExpr::And(Box::new(a.map_leaves(f)), Box::new(b.map_leaves(f))),
            CondExpr::Or(a, b) => CondExpr::Or(Box::new(a.map_leaves(f)), Box::new(b.map_leaves(f))),
            CondExpr::Not(inner) => CondExpr::Not(Box::new(inner.map_leaves(f))),
        }
    }
}

impl fmt::Display for CondExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CondExpr::Bool(b) => write!(f, "{}", b),
            CondExpr::Compare { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            CondExpr::And(a, b) => write!(f, "({} && {})", a, b),
            CondExpr::Or(a, b) => write!(f, "({} || {})", a, b),
            CondExpr::Not(inner) => write!(f, "!({})", inner),
        }
    }
}

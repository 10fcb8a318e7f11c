//! Composition engine domain models
//!
//! The simulator works over [`AbstractValue`]s: linear forms over symbolic
//! unknowns with an integer constant, or an opaque token when arithmetic
//! leaves the linear fragment. A fully concrete value is a linear form without
//! terms.

use crate::shared::models::{BinOp, CmpOp, FunctionId, OpRef, VarId};
use std::collections::BTreeMap;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Values
// ═══════════════════════════════════════════════════════════════════════════

/// `Σ coeff·symbol + constant`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LinearForm {
    /// Zero coefficients are never stored
    pub terms: BTreeMap<String, i128>,
    pub constant: i128,
}

impl LinearForm {
    fn scaled(&self, factor: i128) -> Option<LinearForm> {
        let mut terms = BTreeMap::new();
        for (sym, coeff) in &self.terms {
            let c = coeff.checked_mul(factor)?;
            if c != 0 {
                terms.insert(sym.clone(), c);
            }
        }
        Some(LinearForm {
            terms,
            constant: self.constant.checked_mul(factor)?,
        })
    }

    fn combined(&self, other: &LinearForm, sign: i128) -> Option<LinearForm> {
        let mut terms = self.terms.clone();
        for (sym, coeff) in &other.terms {
            let entry = terms.entry(sym.clone()).or_insert(0);
            *entry = entry.checked_add(coeff.checked_mul(sign)?)?;
            if *entry == 0 {
                terms.remove(sym);
            }
        }
        Some(LinearForm {
            terms,
            constant: self
                .constant
                .checked_add(other.constant.checked_mul(sign)?)?,
        })
    }
}

impl fmt::Display for LinearForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "{}", self.constant);
        }
        let mut first = true;
        for (sym, coeff) in &self.terms {
            let sep = if first { "" } else { " + " };
            match coeff {
                1 => write!(f, "{}{}", sep, sym)?,
                c => write!(f, "{}{}*{}", sep, c, sym)?,
            }
            first = false;
        }
        if self.constant != 0 {
            write!(f, " + {}", self.constant)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbstractValue {
    Linear(LinearForm),
    /// Outside the linear fragment; the token is a canonical rendering
    Opaque(String),
}

impl AbstractValue {
    pub fn constant(value: i128) -> Self {
        AbstractValue::Linear(LinearForm {
            terms: BTreeMap::new(),
            constant: value,
        })
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(name.into(), 1);
        AbstractValue::Linear(LinearForm { terms, constant: 0 })
    }

    pub fn as_const(&self) -> Option<i128> {
        match self {
            AbstractValue::Linear(form) if form.terms.is_empty() => Some(form.constant),
            _ => None,
        }
    }

    /// Coefficient of `symbol` when linear
    pub fn coefficient(&self, symbol: &str) -> Option<i128> {
        match self {
            AbstractValue::Linear(form) => Some(form.terms.get(symbol).copied().unwrap_or(0)),
            AbstractValue::Opaque(_) => None,
        }
    }

    fn opaque(op: BinOp, lhs: &AbstractValue, rhs: &AbstractValue) -> Self {
        AbstractValue::Opaque(format!("{}({}, {})", op.symbol(), lhs, rhs))
    }

    /// Apply a binary operator. `Err` carries a revert reason.
    pub fn apply(op: BinOp, lhs: &AbstractValue, rhs: &AbstractValue) -> Result<AbstractValue, String> {
        use AbstractValue::Linear;

        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return concrete(op, a, b).map(AbstractValue::constant);
        }

        let result = match (op, lhs, rhs) {
            (BinOp::Add, Linear(a), Linear(b)) => a.combined(b, 1),
            (BinOp::Sub, Linear(a), Linear(b)) => a.combined(b, -1),
            (BinOp::Mul, Linear(a), _) if rhs.as_const().is_some() => {
                rhs.as_const().and_then(|k| a.scaled(k))
            }
            (BinOp::Mul, _, Linear(b)) if lhs.as_const().is_some() => {
                lhs.as_const().and_then(|k| b.scaled(k))
            }
            (BinOp::Div | BinOp::DivUp, _, _) if rhs.as_const() == Some(0) => {
                return Err("division by zero".to_string());
            }
            (BinOp::Div | BinOp::DivUp, Linear(a), _) if rhs.as_const() == Some(1) => {
                Some(a.clone())
            }
            _ => None,
        };

        Ok(match result {
            Some(form) => Linear(form),
            None => Self::opaque(op, lhs, rhs),
        })
    }

    /// Decide a comparison; `None` when the values are not comparable
    pub fn compare(op: CmpOp, lhs: &AbstractValue, rhs: &AbstractValue) -> Option<bool> {
        match (lhs, rhs) {
            (AbstractValue::Linear(a), AbstractValue::Linear(b)) => {
                let diff = a.combined(b, -1)?;
                if diff.terms.is_empty() {
                    Some(op.holds(diff.constant, 0))
                } else {
                    None
                }
            }
            _ if lhs == rhs => Some(op.holds(0, 0)),
            _ => None,
        }
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractValue::Linear(form) => write!(f, "{}", form),
            AbstractValue::Opaque(token) => write!(f, "{}", token),
        }
    }
}

/// Integer semantics: `Div` rounds toward negative infinity, `DivUp` toward
/// positive infinity
fn concrete(op: BinOp, a: i128, b: i128) -> Result<i128, String> {
    let overflow = || "arithmetic overflow".to_string();
    match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow),
        BinOp::Div | BinOp::DivUp => {
            if b == 0 {
                return Err("division by zero".to_string());
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            let exact = a % b == 0;
            let same_sign = (a < 0) == (b < 0);
            // q is truncated and inexact implies |b| >= 2, so the adjustment fits
            Ok(match op {
                BinOp::Div if !exact && !same_sign => q - 1,
                BinOp::DivUp if !exact && same_sign => q + 1,
                _ => q,
            })
        }
        BinOp::Min => Ok(a.min(b)),
        BinOp::Max => Ok(a.max(b)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// State
// ═══════════════════════════════════════════════════════════════════════════

/// Value given to a variable that was never assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// A fresh symbol named after the variable
    Symbolic,
    Concrete(i128),
}

/// Scratch storage for one test; discarded afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractState {
    values: BTreeMap<VarId, AbstractValue>,
    seed: Seed,
}

impl AbstractState {
    pub fn new(seed: Seed) -> Self {
        Self {
            values: BTreeMap::new(),
            seed,
        }
    }

    /// Seeded state with known values applied
    pub fn with_known(seed: Seed, known: &BTreeMap<VarId, i128>) -> Self {
        let mut state = Self::new(seed);
        for (var, value) in known {
            state.set(var.clone(), AbstractValue::constant(*value));
        }
        state
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn get(&self, var: &VarId) -> AbstractValue {
        match self.values.get(var) {
            Some(value) => value.clone(),
            None => match self.seed {
                Seed::Symbolic => AbstractValue::symbol(var.as_str()),
                Seed::Concrete(v) => AbstractValue::constant(v),
            },
        }
    }

    pub fn set(&mut self, var: VarId, value: AbstractValue) {
        self.values.insert(var, value);
    }

    /// Rendered values of `vars`
    pub fn snapshot<'v>(&self, vars: impl IntoIterator<Item = &'v VarId>) -> BTreeMap<VarId, String> {
        vars.into_iter()
            .map(|v| (v.clone(), self.get(v).to_string()))
            .collect()
    }

    /// Canonical key over explicitly assigned variables
    pub fn fingerprint(&self) -> Vec<(VarId, AbstractValue)> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Simulation
// ═══════════════════════════════════════════════════════════════════════════

/// Concrete call: function plus named arguments in parameter order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub function: FunctionId,
    pub args: Vec<(String, i128)>,
}

/// Result of simulating one call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed {
        state: AbstractState,
        returned: Option<AbstractValue>,
    },
    /// Execution stopped at the requested operation
    Suspended { state: AbstractState },
    Reverted { reason: String, at: Option<OpRef> },
    /// A branch or guard could not be decided
    Indeterminate { reason: String },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Completed { .. } => "completed",
            Outcome::Suspended { .. } => "suspended",
            Outcome::Reverted { .. } => "reverted",
            Outcome::Indeterminate { .. } => "indeterminate",
        }
    }
}

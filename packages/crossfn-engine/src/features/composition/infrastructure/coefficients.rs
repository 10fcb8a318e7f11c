//! Static mover ranking
//!
//! A write's value is evaluated with parameters and bound locals as symbols;
//! the summed magnitude of parameter coefficients estimates how far one call
//! moves the variable. Non-linear writes count as magnitude 1.

use crate::features::composition::domain::AbstractValue;
use crate::shared::models::{walk_body, Function, FunctionId, ModelIndex, Operation, ValueExpr, VarId};
use std::collections::BTreeSet;

const PARAM_PREFIX: &str = "param:";

fn symbolic(expr: &ValueExpr) -> AbstractValue {
    match expr {
        ValueExpr::Const(v) => AbstractValue::constant(*v),
        ValueExpr::Param(name) => AbstractValue::symbol(format!("{}{}", PARAM_PREFIX, name)),
        ValueExpr::Local(name) => AbstractValue::symbol(format!("local:{}", name)),
        ValueExpr::Storage(var) => AbstractValue::symbol(var.as_str()),
        ValueExpr::Binary { op, lhs, rhs } => {
            AbstractValue::apply(*op, &symbolic(lhs), &symbolic(rhs))
                .unwrap_or_else(AbstractValue::Opaque)
        }
    }
}

/// Estimated effect of one call of `function` on `terms`
pub fn mover_magnitude(function: &Function, terms: &BTreeSet<VarId>) -> i128 {
    let mut magnitude = 0i128;
    walk_body(&function.body, &mut |_, op| {
        let Operation::StorageWrite { var, value } = op else {
            return;
        };
        if !terms.contains(var) {
            return;
        }
        magnitude += match symbolic(value) {
            AbstractValue::Linear(form) => form
                .terms
                .iter()
                .filter(|(sym, _)| sym.starts_with(PARAM_PREFIX))
                .map(|(_, coeff)| coeff.saturating_abs())
                .fold(0i128, |acc, c| acc.saturating_add(c))
                .max(1),
            AbstractValue::Opaque(_) => 1,
        };
    });
    magnitude.max(1)
}

/// Movers ordered by magnitude descending, then id
pub fn rank_movers<'a>(
    index: &ModelIndex<'a>,
    movers: &BTreeSet<FunctionId>,
    terms: &BTreeSet<VarId>,
) -> Vec<&'a Function> {
    let mut ranked: Vec<(i128, &'a Function)> = movers
        .iter()
        .filter_map(|id| index.function(id))
        .map(|f| (mover_magnitude(f, terms), f))
        .collect();
    ranked.sort_by(|(ma, fa), (mb, fb)| mb.cmp(ma).then_with(|| fa.id.cmp(&fb.id)));
    ranked.into_iter().map(|(_, f)| f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::AccessControl;

    fn function(value: ValueExpr) -> Function {
        Function {
            id: "C.f".into(),
            contract: "C".into(),
            access: AccessControl::Unrestricted,
            external: true,
            view: false,
            reentrancy_guard: None,
            params: vec![],
            preconditions: vec![],
            body: vec![Operation::StorageWrite {
                var: "C.a".into(),
                value,
            }],
        }
    }

    #[test]
    fn test_param_coefficients() {
        let terms: BTreeSet<VarId> = [VarId::from("C.a")].into_iter().collect();
        let scaled = function(ValueExpr::local("a").add(ValueExpr::param("x").mul(ValueExpr::constant(3))));
        assert_eq!(mover_magnitude(&scaled, &terms), 3);
        let decrement = function(ValueExpr::local("a").sub(ValueExpr::param("x")));
        assert_eq!(mover_magnitude(&decrement, &terms), 1);
        let untouched: BTreeSet<VarId> = [VarId::from("C.b")].into_iter().collect();
        assert_eq!(mover_magnitude(&scaled, &untouched), 1);
    }
}

//! Argument and state selection shared by the composition tests

use crate::features::composition::domain::{AbstractState, CallSpec, Seed};
use crate::shared::models::{ArgValue, CallArg, Function, Param, VarId, WitnessCall};
use std::collections::BTreeMap;

/// Amount used when a parameter declares no samples
pub const DEFAULT_AMOUNT: i128 = 1000;

/// Value of undeclared variables in concrete runs
pub const CONCRETE_SEED: i128 = 1000;

/// Upper bound on argument combinations tried per function
pub const MAX_COMBINATIONS: usize = 8;

/// Preferred value of a parameter
pub fn default_arg(param: &Param) -> i128 {
    match param.samples.first() {
        Some(v) => *v,
        None if param.is_amount => DEFAULT_AMOUNT,
        None => 1,
    }
}

pub fn default_args(function: &Function) -> Vec<(String, i128)> {
    function
        .params
        .iter()
        .map(|p| (p.name.clone(), default_arg(p)))
        .collect()
}

/// Candidates for sequence search: samples, else a small and a typical value
pub fn search_candidates(param: &Param) -> Vec<i128> {
    if !param.samples.is_empty() {
        return param.samples.clone();
    }
    if param.is_amount {
        vec![1, DEFAULT_AMOUNT]
    } else {
        vec![0, 1]
    }
}

/// Candidates for poisoning: samples, else boundary values
pub fn poison_candidates(param: &Param) -> Vec<i128> {
    if !param.samples.is_empty() {
        return param.samples.clone();
    }
    vec![0, 1, DEFAULT_AMOUNT]
}

/// Cartesian product of per-parameter candidates, first `MAX_COMBINATIONS`
pub fn combinations(function: &Function, candidates: impl Fn(&Param) -> Vec<i128>) -> Vec<Vec<(String, i128)>> {
    let mut combos: Vec<Vec<(String, i128)>> = vec![Vec::new()];
    for param in &function.params {
        let values = candidates(param);
        let mut next = Vec::new();
        'outer: for combo in &combos {
            for value in &values {
                if next.len() >= MAX_COMBINATIONS {
                    break 'outer;
                }
                let mut extended = combo.clone();
                extended.push((param.name.clone(), *value));
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

pub fn concrete_state(known: &BTreeMap<VarId, i128>) -> AbstractState {
    AbstractState::with_known(Seed::Concrete(CONCRETE_SEED), known)
}

pub fn symbolic_state(known: &BTreeMap<VarId, i128>) -> AbstractState {
    AbstractState::with_known(Seed::Symbolic, known)
}

impl CallSpec {
    pub fn new(function: &Function, args: Vec<(String, i128)>) -> Self {
        Self {
            function: function.id.clone(),
            args,
        }
    }

    pub fn witness(&self) -> WitnessCall {
        WitnessCall::new(
            self.function.clone(),
            self.args
                .iter()
                .map(|(name, value)| CallArg {
                    name: name.clone(),
                    value: ArgValue::Concrete(*value),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::AccessControl;

    fn function(params: Vec<Param>) -> Function {
        Function {
            id: "C.f".into(),
            contract: "C".into(),
            access: AccessControl::Unrestricted,
            external: true,
            view: false,
            reentrancy_guard: None,
            params,
            preconditions: vec![],
            body: vec![],
        }
    }

    #[test]
    fn test_defaults_prefer_samples() {
        let f = function(vec![Param::amount("a").with_samples([7, 9]), Param::amount("b"), Param::new("c")]);
        let args = default_args(&f);
        assert_eq!(args[0].1, 7);
        assert_eq!(args[1].1, DEFAULT_AMOUNT);
        assert_eq!(args[2].1, 1);
    }

    #[test]
    fn test_combinations_are_capped() {
        let f = function(vec![
            Param::new("a").with_samples([1, 2, 3]),
            Param::new("b").with_samples([1, 2, 3]),
        ]);
        let combos = combinations(&f, poison_candidates);
        assert_eq!(combos.len(), MAX_COMBINATIONS);
        assert_eq!(combos[0], vec![("a".to_string(), 1), ("b".to_string(), 1)]);
        assert_eq!(combinations(&function(vec![]), poison_candidates), vec![Vec::new()]);
    }
}

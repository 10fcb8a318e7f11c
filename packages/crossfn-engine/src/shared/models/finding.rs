//! Finding records
//!
//! A [`Finding`] is self-contained: everything a downstream reporter needs is
//! copied in (ids, rendered expressions, concrete witness values). Findings are
//! produced through [`FindingBuilder`], which derives the stable id from the
//! category and witness.

use super::ids::{ContractId, FunctionId, OpRef, VarId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Finding category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCategory {
    StaleData,
    NonCommutative,
    Interleaving,
    Amplification,
    StatePoisoning,
    InvariantSequence,
    PermissionlessAccounting,
}

impl FindingCategory {
    pub const ALL: [FindingCategory; 7] = [
        FindingCategory::StaleData,
        FindingCategory::NonCommutative,
        FindingCategory::Interleaving,
        FindingCategory::Amplification,
        FindingCategory::StatePoisoning,
        FindingCategory::InvariantSequence,
        FindingCategory::PermissionlessAccounting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::StaleData => "stale-data",
            FindingCategory::NonCommutative => "non-commutative",
            FindingCategory::Interleaving => "interleaving",
            FindingCategory::Amplification => "amplification",
            FindingCategory::StatePoisoning => "state-poisoning",
            FindingCategory::InvariantSequence => "invariant-sequence",
            FindingCategory::PermissionlessAccounting => "permissionless-accounting",
        }
    }

    /// Two-letter prefix used in finding ids
    fn code(&self) -> &'static str {
        match self {
            FindingCategory::StaleData => "SD",
            FindingCategory::NonCommutative => "NC",
            FindingCategory::Interleaving => "IL",
            FindingCategory::Amplification => "AM",
            FindingCategory::StatePoisoning => "SP",
            FindingCategory::InvariantSequence => "IS",
            FindingCategory::PermissionlessAccounting => "PA",
        }
    }
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal set of entities involved in a finding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub functions: BTreeSet<FunctionId>,
    pub variables: BTreeSet<VarId>,
    pub operations: BTreeSet<OpRef>,
}

/// Argument value in a witness call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    Concrete(i128),
    /// Value left to the reproducer (`<any>`, `<attacker-chosen>`)
    Placeholder(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Concrete(v) => write!(f, "{}", v),
            ArgValue::Placeholder(p) => write!(f, "<{}>", p),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArg {
    pub name: String,
    pub value: ArgValue,
}

/// One step of a reproducible witness sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessCall {
    pub function: FunctionId,
    pub args: Vec<CallArg>,

    /// Values of the relevant variables after this call
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_after: BTreeMap<VarId, String>,
}

impl WitnessCall {
    pub fn new(function: FunctionId, args: Vec<CallArg>) -> Self {
        Self {
            function,
            args,
            state_after: BTreeMap::new(),
        }
    }

    pub fn with_state(mut self, state_after: BTreeMap<VarId, String>) -> Self {
        self.state_after = state_after;
        self
    }

    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

impl fmt::Display for WitnessCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(|a| a.value.to_string()).collect();
        write!(f, "{}({})", self.function.short_name(), args.join(", "))
    }
}

/// Immutable finding record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub category: FindingCategory,
    pub contract: ContractId,
    /// Primary function (where the problem is anchored)
    pub function: FunctionId,
    pub title: String,
    pub witness: Witness,
    /// 0.0..=10.0, one decimal
    pub severity: f64,
    pub sequence: Vec<WitnessCall>,
    /// Second ordering for order-dependent categories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_sequence: Vec<WitnessCall>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    #[serde(default)]
    pub incomplete: bool,
}

impl Finding {
    pub fn builder(
        category: FindingCategory,
        contract: ContractId,
        function: FunctionId,
    ) -> FindingBuilder {
        FindingBuilder::new(category, contract, function)
    }

    /// Copy with a new severity (aggregation re-scoring)
    pub fn rescored(&self, severity: f64) -> Finding {
        Finding {
            severity: clamp_severity(severity),
            ..self.clone()
        }
    }

    pub fn sequence_display(&self) -> String {
        self.sequence
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Clamp to `[0, 10]` and round to one decimal
pub fn clamp_severity(severity: f64) -> f64 {
    if severity.is_nan() {
        return 0.0;
    }
    (severity.clamp(0.0, 10.0) * 10.0).round() / 10.0
}

/// Builder for [`Finding`]
#[derive(Debug, Clone)]
pub struct FindingBuilder {
    category: FindingCategory,
    contract: ContractId,
    function: FunctionId,
    title: String,
    witness: Witness,
    severity: f64,
    sequence: Vec<WitnessCall>,
    alternate_sequence: Vec<WitnessCall>,
    evidence: Vec<String>,
    details: BTreeMap<String, String>,
    incomplete: bool,
    keys: Vec<String>,
}

impl FindingBuilder {
    fn new(category: FindingCategory, contract: ContractId, function: FunctionId) -> Self {
        let mut witness = Witness::default();
        witness.functions.insert(function.clone());
        Self {
            category,
            contract,
            function,
            title: String::new(),
            witness,
            severity: 0.0,
            sequence: Vec::new(),
            alternate_sequence: Vec::new(),
            evidence: Vec::new(),
            details: BTreeMap::new(),
            incomplete: false,
            keys: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn function(mut self, function: FunctionId) -> Self {
        self.witness.functions.insert(function);
        self
    }

    pub fn variables<'a>(mut self, vars: impl IntoIterator<Item = &'a VarId>) -> Self {
        self.witness.variables.extend(vars.into_iter().cloned());
        self
    }

    pub fn operation(mut self, op: OpRef) -> Self {
        self.witness.functions.insert(op.function.clone());
        self.witness.operations.insert(op);
        self
    }

    pub fn severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }

    pub fn sequence(mut self, sequence: Vec<WitnessCall>) -> Self {
        for call in &sequence {
            self.witness.functions.insert(call.function.clone());
        }
        self.sequence = sequence;
        self
    }

    pub fn alternate_sequence(mut self, sequence: Vec<WitnessCall>) -> Self {
        self.alternate_sequence = sequence;
        self
    }

    pub fn evidence(mut self, line: impl Into<String>) -> Self {
        self.evidence.push(line.into());
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }

    pub fn incomplete(mut self, incomplete: bool) -> Self {
        self.incomplete = incomplete;
        self
    }

    /// Extra identity for findings whose witnesses can coincide, such as
    /// two invariants broken by the same calls
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn build(self) -> Finding {
        let id = finding_id(self.category, &self.function, &self.witness, &self.keys);
        Finding {
            id,
            category: self.category,
            contract: self.contract,
            function: self.function,
            title: self.title,
            witness: self.witness,
            severity: clamp_severity(self.severity),
            sequence: self.sequence,
            alternate_sequence: self.alternate_sequence,
            evidence: self.evidence,
            details: self.details,
            incomplete: self.incomplete,
        }
    }
}

/// Content hash of category, anchor, witness and keys
fn finding_id(category: FindingCategory, function: &FunctionId, witness: &Witness, keys: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(function.as_str().as_bytes());
    for f in &witness.functions {
        hasher.update(b"\0f:");
        hasher.update(f.as_str().as_bytes());
    }
    for v in &witness.variables {
        hasher.update(b"\0v:");
        hasher.update(v.as_str().as_bytes());
    }
    for op in &witness.operations {
        hasher.update(b"\0o:");
        hasher.update(op.to_string().as_bytes());
    }
    for key in keys {
        hasher.update(b"\0k:");
        hasher.update(key.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    format!("{}-{}", category.code(), &hex.as_str()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::OpPath;

    fn sample() -> FindingBuilder {
        Finding::builder(
            FindingCategory::StaleData,
            "Vault".into(),
            "Vault.deposit".into(),
        )
        .function("Vault.convertToShares".into())
        .variables([&VarId::from("Vault.totalAssets")])
        .operation(OpRef::new("Vault.deposit".into(), OpPath::root(2)))
    }

    #[test]
    fn test_id_is_stable_and_content_addressed() {
        let a = sample().title("one").severity(5.0).build();
        let b = sample().title("two").severity(7.0).build();
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("SD-"));

        let c = sample().variables([&VarId::from("Vault.totalSupply")]).build();
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_key_separates_identical_witnesses() {
        let a = sample().key("invariant:capA").build();
        let b = sample().key("invariant:capB").build();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id, sample().key("invariant:capA").build().id);
        assert_ne!(a.id, sample().build().id);
    }

    #[test]
    fn test_severity_clamped() {
        assert_eq!(sample().severity(12.3).build().severity, 10.0);
        assert_eq!(sample().severity(-1.0).build().severity, 0.0);
        assert_eq!(sample().severity(6.66).build().severity, 6.7);
    }

    #[test]
    fn test_witness_call_display() {
        let call = WitnessCall::new(
            "Pool.A".into(),
            vec![CallArg {
                name: "x".into(),
                value: ArgValue::Concrete(100),
            }],
        );
        assert_eq!(call.to_string(), "A(100)");
        assert_eq!(call.arg("x"), Some(&ArgValue::Concrete(100)));
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&FindingCategory::PermissionlessAccounting).unwrap();
        assert_eq!(json, "\"permissionless-accounting\"");
    }
}

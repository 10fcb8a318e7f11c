//! Program Model - contracts, functions and storage variables
//!
//! Pure data handed over by the upstream extraction stage. The engine never
//! mutates it; every derived annotation (writer/reader sets, windows, findings)
//! lives in engine-owned structures.

use super::expr::CondExpr;
use super::ids::{ContractId, FunctionId, VarId};
use super::invariant::{Invariant, ValueProbe};
use super::operation::Operation;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════
// Storage
// ═══════════════════════════════════════════════════════════════════════════

/// Declared storage type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Integer {
        #[serde(default)]
        signed: bool,
    },
    Address,
    Bool,
    Mapping {
        key: String,
        value: String,
    },
    /// Field packed into a shared slot
    Packed { field: String, bits: u16 },
}

impl StorageType {
    /// Unsigned integer semantics (writes of negative values revert)
    pub fn is_unsigned(&self) -> bool {
        match self {
            StorageType::Integer { signed } => !signed,
            StorageType::Packed { .. } | StorageType::Bool | StorageType::Address => true,
            StorageType::Mapping { .. } => false,
        }
    }
}

impl Default for StorageType {
    fn default() -> Self {
        StorageType::Integer { signed: false }
    }
}

/// How much economic weight readers put on a variable.
///
/// Supplied by the collaborator that extracts domain invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Sensitivity {
    /// Feeds economic decisions
    pub fn is_economic(&self) -> bool {
        matches!(self, Sensitivity::High | Sensitivity::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVariable {
    pub id: VarId,
    pub contract: ContractId,
    /// Slot or access path (`0x3`, `balances[*]`, `slot 5 bits 0..128`)
    #[serde(default)]
    pub slot: String,
    #[serde(default)]
    pub ty: StorageType,
    #[serde(default)]
    pub sensitivity: Sensitivity,
}

// ═══════════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════════

/// Access-control classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessControl {
    Unrestricted,
    Permissioned(String),
    InternalOnly,
}

/// Declared role; `self_enrollable` roles can be obtained by anyone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDecl {
    pub name: String,
    #[serde(default)]
    pub self_enrollable: bool,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,

    /// The parameter is a token amount (amplification candidates)
    #[serde(default)]
    pub is_amount: bool,

    /// Concrete values worth exploring, in preference order
    #[serde(default)]
    pub samples: Vec<i128>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_amount: false,
            samples: Vec::new(),
        }
    }

    pub fn amount(name: impl Into<String>) -> Self {
        Self {
            is_amount: true,
            ..Self::new(name)
        }
    }

    pub fn with_samples(mut self, samples: impl IntoIterator<Item = i128>) -> Self {
        self.samples = samples.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub contract: ContractId,
    pub access: AccessControl,

    /// Callable from outside the protocol
    #[serde(default = "default_true")]
    pub external: bool,

    /// Declared read-only (externally observable read function)
    #[serde(default)]
    pub view: bool,

    /// Reentrancy lock name; functions sharing a lock exclude each other
    #[serde(default)]
    pub reentrancy_guard: Option<String>,

    #[serde(default)]
    pub params: Vec<Param>,

    /// Declared local preconditions, evaluated at entry
    #[serde(default)]
    pub preconditions: Vec<CondExpr>,

    #[serde(default)]
    pub body: Vec<Operation>,
}

fn default_true() -> bool {
    true
}

impl Function {
    pub fn name(&self) -> &str {
        self.id.short_name()
    }

    /// Reachable from a transaction or callback (external and not internal-only)
    pub fn is_entrypoint(&self) -> bool {
        self.external && self.access != AccessControl::InternalOnly
    }

    /// An arbitrary account can call this function.
    ///
    /// Unknown roles count as restricted.
    pub fn is_attacker_callable(&self, roles: &[RoleDecl]) -> bool {
        if !self.is_entrypoint() {
            return false;
        }
        match &self.access {
            AccessControl::Unrestricted => true,
            AccessControl::Permissioned(role) => roles
                .iter()
                .any(|decl| &decl.name == role && decl.self_enrollable),
            AccessControl::InternalOnly => false,
        }
    }

    /// Both functions hold the same reentrancy lock
    pub fn shares_guard_with(&self, other: &Function) -> bool {
        matches!(
            (&self.reentrancy_guard, &other.reentrancy_guard),
            (Some(a), Some(b)) if a == b
        )
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub variables: Vec<StorageVariable>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Program
// ═══════════════════════════════════════════════════════════════════════════

/// The whole protocol under analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramModel {
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub roles: Vec<RoleDecl>,
}

impl ProgramModel {
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.contracts.iter().flat_map(|c| c.functions.iter())
    }

    pub fn variables(&self) -> impl Iterator<Item = &StorageVariable> {
        self.contracts.iter().flat_map(|c| c.variables.iter())
    }

    pub fn contract(&self, id: &ContractId) -> Option<&Contract> {
        self.contracts.iter().find(|c| &c.id == id)
    }

    /// Build an O(1) lookup index
    pub fn index(&self) -> ModelIndex<'_> {
        ModelIndex::new(self)
    }
}

/// Borrowed lookup tables over a [`ProgramModel`]
#[derive(Debug, Clone)]
pub struct ModelIndex<'a> {
    pub model: &'a ProgramModel,
    functions: FxHashMap<&'a FunctionId, &'a Function>,
    variables: FxHashMap<&'a VarId, &'a StorageVariable>,
}

impl<'a> ModelIndex<'a> {
    fn new(model: &'a ProgramModel) -> Self {
        Self {
            model,
            functions: model.functions().map(|f| (&f.id, f)).collect(),
            variables: model.variables().map(|v| (&v.id, v)).collect(),
        }
    }

    pub fn function(&self, id: &FunctionId) -> Option<&'a Function> {
        self.functions.get(id).copied()
    }

    pub fn variable(&self, id: &VarId) -> Option<&'a StorageVariable> {
        self.variables.get(id).copied()
    }

    pub fn roles(&self) -> &'a [RoleDecl] {
        &self.model.roles
    }

    /// Variables declared by `contract`
    pub fn contract_variables(&self, contract: &ContractId) -> impl Iterator<Item = &'a VarId> {
        self.model
            .contract(contract)
            .into_iter()
            .flat_map(|c| c.variables.iter().map(|v| &v.id))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Engine input
// ═══════════════════════════════════════════════════════════════════════════

/// Everything the engine consumes for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub model: ProgramModel,

    /// Declared invariants (explicit)
    #[serde(default)]
    pub invariants: Vec<Invariant>,

    /// Value expressions used to attribute ordering benefit
    #[serde(default)]
    pub probes: Vec<ValueProbe>,

    /// Known values of storage variables before the analyzed transactions
    #[serde(default)]
    pub initial_state: BTreeMap<VarId, i128>,
}

impl AnalysisInput {
    pub fn new(model: ProgramModel) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }
}

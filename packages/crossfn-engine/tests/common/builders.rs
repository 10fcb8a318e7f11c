//! Test data builders

use crossfn_engine::config::EngineConfig;
use crossfn_engine::features::dependency_graph::{DependencyGraph, DependencyGraphBuilder};
use crossfn_engine::shared::models::{
    AccessControl, AnalysisInput, Calldata, CondExpr, Contract, ExternalTarget, Function, FunctionId,
    Operation, Param, ProgramModel, RoleDecl, Sensitivity, StorageType, StorageVariable, ValueExpr,
    VarId,
};

/// Builder for one contract
#[derive(Debug)]
pub struct ContractBuilder {
    contract: Contract,
}

impl ContractBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            contract: Contract {
                id: id.into(),
                functions: Vec::new(),
                variables: Vec::new(),
            },
        }
    }

    /// Unsigned integer variable `Contract.name`
    pub fn var(mut self, name: &str, sensitivity: Sensitivity) -> Self {
        let id = format!("{}.{}", self.contract.id, name);
        self.contract.variables.push(StorageVariable {
            id: id.into(),
            contract: self.contract.id.clone(),
            slot: format!("{}", self.contract.variables.len()),
            ty: StorageType::Integer { signed: false },
            sensitivity,
        });
        self
    }

    pub fn function(mut self, function: Function) -> Self {
        self.contract.functions.push(function);
        self
    }

    pub fn build(self) -> Contract {
        self.contract
    }
}

/// Builder for one function; unrestricted, external and mutating by default
#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
}

impl FunctionBuilder {
    pub fn new(contract: &str, name: &str) -> Self {
        Self {
            function: Function {
                id: format!("{}.{}", contract, name).into(),
                contract: contract.into(),
                access: AccessControl::Unrestricted,
                external: true,
                view: false,
                reentrancy_guard: None,
                params: Vec::new(),
                preconditions: Vec::new(),
                body: Vec::new(),
            },
        }
    }

    pub fn view(mut self) -> Self {
        self.function.view = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.function.access = AccessControl::InternalOnly;
        self.function.external = false;
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.function.access = AccessControl::Permissioned(role.to_string());
        self
    }

    pub fn guard(mut self, lock: &str) -> Self {
        self.function.reentrancy_guard = Some(lock.to_string());
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.function.params.push(param);
        self
    }

    pub fn precondition(mut self, cond: CondExpr) -> Self {
        self.function.preconditions.push(cond);
        self
    }

    pub fn op(mut self, op: Operation) -> Self {
        self.function.body.push(op);
        self
    }

    pub fn ops(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.function.body.extend(ops);
        self
    }

    pub fn build(self) -> Function {
        self.function
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════════════════════

pub fn read(var: &str, bind: &str) -> Operation {
    Operation::StorageRead {
        var: var.into(),
        bind: Some(bind.to_string()),
    }
}

pub fn write(var: &str, value: ValueExpr) -> Operation {
    Operation::StorageWrite {
        var: var.into(),
        value,
    }
}

pub fn call(target: &str, returns: Option<&str>) -> Operation {
    Operation::ExternalCall {
        target: ExternalTarget::new(target),
        calldata: Calldata::selector("call"),
        returns: returns.map(str::to_string),
    }
}

pub fn require(cond: CondExpr) -> Operation {
    Operation::Require { cond }
}

pub fn branch(cond: CondExpr, then_ops: Vec<Operation>, else_ops: Vec<Operation>) -> Operation {
    Operation::Branch {
        cond,
        then_ops,
        else_ops,
    }
}

pub fn internal_call(callee: &str, args: Vec<ValueExpr>, returns: Option<&str>) -> Operation {
    Operation::InternalCall {
        callee: callee.into(),
        args,
        returns: returns.map(str::to_string),
    }
}

pub fn ret(value: ValueExpr) -> Operation {
    Operation::Return { value: Some(value) }
}

pub fn local(name: &str) -> ValueExpr {
    ValueExpr::local(name)
}

pub fn param(name: &str) -> ValueExpr {
    ValueExpr::param(name)
}

pub fn storage(var: &str) -> ValueExpr {
    ValueExpr::storage(var)
}

pub fn constant(value: i128) -> ValueExpr {
    ValueExpr::constant(value)
}

// ═══════════════════════════════════════════════════════════════════════════
// Models
// ═══════════════════════════════════════════════════════════════════════════

pub fn model(contracts: Vec<Contract>) -> ProgramModel {
    ProgramModel {
        contracts,
        roles: Vec::new(),
    }
}

pub fn model_with_roles(contracts: Vec<Contract>, roles: &[(&str, bool)]) -> ProgramModel {
    ProgramModel {
        contracts,
        roles: roles
            .iter()
            .map(|(name, self_enrollable)| RoleDecl {
                name: name.to_string(),
                self_enrollable: *self_enrollable,
            })
            .collect(),
    }
}

pub fn fid(id: &str) -> FunctionId {
    FunctionId::from(id)
}

pub fn vid(id: &str) -> VarId {
    VarId::from(id)
}

/// Graph over the explicit invariants of `input`
pub fn build_graph(input: &AnalysisInput, config: &EngineConfig) -> DependencyGraph {
    DependencyGraphBuilder::new(config)
        .build(input, &input.invariants)
        .expect("valid model")
}

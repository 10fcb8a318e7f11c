//! Program Model and engine records

pub mod diagnostic;
pub mod expr;
pub mod finding;
pub mod ids;
pub mod invariant;
pub mod operation;
pub mod program;

pub use diagnostic::{Diagnostic, UnresolvedReason};
pub use expr::{BinOp, CmpOp, CondExpr, ValueExpr};
pub use finding::{
    clamp_severity, ArgValue, CallArg, Finding, FindingBuilder, FindingCategory, Witness,
    WitnessCall,
};
pub use ids::{Arm, ContractId, FunctionId, OpPath, OpRef, VarId};
pub use invariant::{Invariant, InvariantOrigin, ValueProbe};
pub use operation::{op_at, walk_body, Calldata, ExternalTarget, Operation};
pub use program::{
    AccessControl, AnalysisInput, Contract, Function, ModelIndex, Param, ProgramModel, RoleDecl,
    Sensitivity, StorageType, StorageVariable,
};

//! Window analysis domain models

use crate::shared::models::{FunctionId, OpRef, VarId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ═══════════════════════════════════════════════════════════════════════════
// Traces
// ═══════════════════════════════════════════════════════════════════════════

/// Storage-relevant event on a linear trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Read(VarId),
    Write(VarId),
    ExternalCall,
    Callback { triggered_by: OpRef },
    /// Call that could not be inlined; may write anything in `may_write`
    Opaque {
        callee: FunctionId,
        may_write: BTreeSet<VarId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub kind: StepKind,
    /// Operation that produced the step (possibly inside an inlined callee)
    pub origin: OpRef,
    /// Inlining depth (0 for the analyzed function itself)
    pub depth: usize,
}

/// One linear path through a function, callees inlined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
    /// Conservative merge of the traces beyond the enumeration bound
    pub merged: bool,
}

impl Trace {
    /// Definite writes in `steps[range]`
    pub fn writes_in(&self, range: std::ops::Range<usize>) -> BTreeSet<VarId> {
        self.steps[range]
            .iter()
            .filter_map(|s| match &s.kind {
                StepKind::Write(var) => Some(var.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Result of enumerating one function
#[derive(Debug, Clone, Default)]
pub struct TraceSet {
    pub traces: Vec<Trace>,
    /// More traces than the bound existed; a merged trace was appended
    pub overflow: bool,
    /// The step budget ran out before enumeration finished
    pub truncated: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Windows
// ═══════════════════════════════════════════════════════════════════════════

/// View function that would read a pre/post mix inside a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleView {
    pub view: FunctionId,
    /// Pending variables the view reads
    pub variables: BTreeSet<VarId>,
}

/// `[entry, exit)` over a trace, anchored at an external call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionWindow {
    pub function: FunctionId,
    /// Index of the trace inside the function's trace set
    pub trace: usize,
    /// The external call opening the window
    pub anchor: OpRef,
    /// Matching declared callback point, when present
    pub callback: Option<OpRef>,
    pub entry: usize,
    pub exit: usize,
    pub updated: BTreeSet<VarId>,
    pub pending: BTreeSet<VarId>,
    pub stale_views: Vec<StaleView>,
}

/// Windows of one function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowReport {
    pub function: FunctionId,
    pub traces: usize,
    pub overflow: bool,
    pub windows: Vec<ExecutionWindow>,
}

impl WindowReport {
    /// Windows of trace `trace`, in trace order
    pub fn windows_of_trace(&self, trace: usize) -> impl Iterator<Item = &ExecutionWindow> {
        self.windows.iter().filter(move |w| w.trace == trace)
    }
}

//! Accounting taint domain models

use crate::shared::models::{OpRef, VarId};
use std::collections::{BTreeMap, BTreeSet};

/// An external call whose return value is not trusted
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaintSource {
    pub call: OpRef,
    /// Target label; two sources are independent when labels differ
    pub target: String,
}

/// Taint of one value: its sources and how it was derived
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taint {
    pub sources: BTreeSet<TaintSource>,
    /// call -> intermediate expressions, oldest first
    pub chain: Vec<String>,
}

impl Taint {
    pub fn source(source: TaintSource) -> Self {
        let chain = vec![format!("call {} at {}", source.target, source.call)];
        Self {
            sources: [source].into_iter().collect(),
            chain,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn targets(&self) -> BTreeSet<&str> {
        self.sources.iter().map(|s| s.target.as_str()).collect()
    }

    /// Union; the longer chain is kept
    pub fn merge(&mut self, other: &Taint) {
        self.sources.extend(other.sources.iter().cloned());
        if other.chain.len() > self.chain.len() {
            self.chain = other.chain.clone();
        }
    }

    pub fn then(mut self, step: impl Into<String>) -> Self {
        if !self.is_clean() {
            self.chain.push(step.into());
        }
        self
    }
}

/// A storage write whose value carries taint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaintedWrite {
    pub var: VarId,
    pub at: OpRef,
    pub taint: Taint,
    /// Sources cross-checked by a guard on every path reaching this write
    pub cleared: BTreeSet<TaintSource>,
}

impl TaintedWrite {
    /// Sources no dominating guard cross-checked
    pub fn open_sources(&self) -> BTreeSet<&TaintSource> {
        self.taint
            .sources
            .iter()
            .filter(|s| !self.cleared.contains(s))
            .collect()
    }
}

/// A guard comparing two operands with their taints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardCheck {
    pub at: OpRef,
    pub lhs: Taint,
    pub rhs: Taint,
}

impl GuardCheck {
    /// Both sides tainted by disjoint target sets
    pub fn corroborates(&self) -> bool {
        let (l, r) = (self.lhs.targets(), self.rhs.targets());
        !l.is_empty() && !r.is_empty() && l.is_disjoint(&r)
    }
}

/// Everything the propagation pass learned about one function
#[derive(Debug, Clone, Default)]
pub struct TaintSummary {
    pub writes: Vec<TaintedWrite>,
    pub guards: Vec<GuardCheck>,
}

impl TaintSummary {
    /// Sources cross-checked by some guard, on any path
    pub fn corroborated(&self) -> BTreeSet<&TaintSource> {
        self.guards
            .iter()
            .filter(|g| g.corroborates())
            .flat_map(|g| g.lhs.sources.iter().chain(g.rhs.sources.iter()))
            .collect()
    }

    /// Writes grouped by variable, keeping only the sources left open on
    /// the write's own path
    pub fn uncorroborated_writes(&self) -> BTreeMap<&VarId, Vec<(&TaintedWrite, BTreeSet<&TaintSource>)>> {
        let mut out: BTreeMap<&VarId, Vec<_>> = BTreeMap::new();
        for write in &self.writes {
            let open = write.open_sources();
            if !open.is_empty() {
                out.entry(&write.var).or_default().push((write, open));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::OpPath;

    fn source(target: &str, index: u32) -> Taint {
        Taint::source(TaintSource {
            call: OpRef::new("C.f".into(), OpPath::root(index)),
            target: target.to_string(),
        })
    }

    #[test]
    fn test_corroboration_requires_independent_targets() {
        let same = GuardCheck {
            at: OpRef::new("C.f".into(), OpPath::root(5)),
            lhs: source("oracle", 0),
            rhs: source("oracle", 1),
        };
        assert!(!same.corroborates());
        let independent = GuardCheck {
            rhs: source("twap", 1),
            ..same.clone()
        };
        assert!(independent.corroborates());
        let one_sided = GuardCheck {
            rhs: Taint::default(),
            ..same
        };
        assert!(!one_sided.corroborates());
    }

    #[test]
    fn test_cleared_sources_are_per_write() {
        let taint = source("oracle", 0);
        let oracle = taint.sources.iter().next().cloned().unwrap();
        let guarded = TaintedWrite {
            var: "C.rate".into(),
            at: OpRef::new("C.f".into(), OpPath::root(3)),
            taint: taint.clone(),
            cleared: [oracle].into_iter().collect(),
        };
        let unguarded = TaintedWrite {
            var: "C.rate".into(),
            at: OpRef::new("C.f".into(), OpPath::root(4)),
            taint,
            cleared: BTreeSet::new(),
        };
        let summary = TaintSummary {
            writes: vec![guarded, unguarded],
            guards: vec![],
        };
        let open = summary.uncorroborated_writes();
        assert_eq!(open[&VarId::from("C.rate")].len(), 1);
        assert_eq!(open[&VarId::from("C.rate")][0].0.at.op, OpPath::root(4));
    }
}

//! Association of boolean literals with edges and bound facts.

use crate::collections::ref_store::RefVec;
use crate::core::{IntCst, Lit};
use crate::stn::store::{Direction, EdgeId, Timepoint};

/// A fact on the value of a single timepoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundFact {
    /// `tp <= value`
    Leq(Timepoint, IntCst),
    /// `tp >= value`
    Geq(Timepoint, IntCst),
}

impl BoundFact {
    pub fn timepoint(self) -> Timepoint {
        match self {
            BoundFact::Leq(tp, _) | BoundFact::Geq(tp, _) => tp,
        }
    }

    pub fn value(self) -> IntCst {
        match self {
            BoundFact::Leq(_, k) | BoundFact::Geq(_, k) => k,
        }
    }

    /// The fact that holds exactly when this one does not.
    pub fn negation(self) -> BoundFact {
        match self {
            BoundFact::Leq(tp, k) => BoundFact::Geq(tp, k + 1),
            BoundFact::Geq(tp, k) => BoundFact::Leq(tp, k - 1),
        }
    }

    /// The `(source, target, weight)` edge that enforces this fact.
    pub fn as_edge(self) -> (Timepoint, Timepoint, IntCst) {
        match self {
            BoundFact::Leq(tp, k) => (Timepoint::ORIGIN, tp, k),
            BoundFact::Geq(tp, k) => (tp, Timepoint::ORIGIN, -k),
        }
    }

    /// Returns `(dir, node, threshold)` such that the fact is entailed as soon as the potential
    /// of `node` in the view `dir` is at most `threshold`.
    pub(crate) fn watch(self) -> (Direction, Timepoint, IntCst) {
        match self {
            BoundFact::Leq(tp, k) => (Direction::Forward, tp, k),
            BoundFact::Geq(tp, k) => (Direction::Backward, tp, -k),
        }
    }
}

/// What a literal stands for in the theory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// The literal guards this edge: the edge is active exactly when the literal is true.
    Edge(EdgeId),
    /// The literal is equivalent to this bound fact.
    Bound(BoundFact),
}

/// A literal to emit once a potential drops to the threshold.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Watch {
    pub threshold: IntCst,
    pub literal: Lit,
}

#[derive(Clone, Default)]
pub(crate) struct Bindings {
    by_literal: RefVec<Lit, Vec<Binding>>,
    /// Bound literals, indexed by the view and node whose potential entails them.
    watches: [RefVec<Timepoint, Vec<Watch>>; 2],
}

impl Bindings {
    pub fn add(&mut self, literal: Lit, binding: Binding) {
        self.by_literal.fill_with(literal, Vec::new);
        self.by_literal[literal].push(binding);
        if let Binding::Bound(fact) = binding {
            let (dir, node, threshold) = fact.watch();
            let watches = &mut self.watches[dir.index()];
            watches.fill_with(node, Vec::new);
            watches[node].push(Watch { threshold, literal });
        }
    }

    pub fn bindings(&self, literal: Lit) -> &[Binding] {
        self.by_literal.get(literal).map(|b| b.as_slice()).unwrap_or(&[])
    }

    pub fn watches(&self, dir: Direction, node: Timepoint) -> &[Watch] {
        self.watches[dir.index()].get(node).map(|w| w.as_slice()).unwrap_or(&[])
    }
}

//! Explanations of the inferences of the theory, as sets of guard literals.

use crate::core::literals::{Disjunction, Lits};
use crate::core::Lit;
use crate::stn::store::{EdgeId, Store};
use std::fmt::{Debug, Formatter};

/// A set of literals, all true, that jointly entail a fact.
///
/// Permanent edges hold unconditionally and contribute nothing: an empty explanation
/// means that the fact holds at the root.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Explanation {
    lits: Lits,
}

impl Explanation {
    pub fn new() -> Self {
        Explanation::default()
    }

    pub fn push(&mut self, lit: Lit) {
        self.lits.insert(lit);
    }

    pub fn literals(&self) -> &[Lit] {
        self.lits.as_slice()
    }

    pub fn iter(&self) -> impl Iterator<Item = Lit> + '_ {
        self.lits.iter()
    }

    pub fn len(&self) -> usize {
        self.lits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    pub fn contains(&self, lit: Lit) -> bool {
        self.lits.contains(lit)
    }

    /// Adds the guards of all given edges.
    pub(crate) fn add_guards(&mut self, store: &Store, edges: impl IntoIterator<Item = EdgeId>) {
        for e in edges {
            if let Some(guard) = store.edge(e).guard() {
                self.push(guard);
            }
        }
    }

    pub(crate) fn sorted(mut self) -> Self {
        self.lits.simplify();
        self
    }
}

impl Debug for Explanation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.lits)
    }
}

impl FromIterator<Lit> for Explanation {
    fn from_iter<T: IntoIterator<Item = Lit>>(iter: T) -> Self {
        let mut e = Explanation::new();
        for l in iter {
            e.push(l);
        }
        e
    }
}

/// A negative cycle in the active graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    cycle: Vec<EdgeId>,
    explanation: Explanation,
}

impl Conflict {
    pub(crate) fn new(store: &Store, cycle: Vec<EdgeId>) -> Conflict {
        let mut explanation = Explanation::new();
        explanation.add_guards(store, cycle.iter().copied());
        Conflict {
            cycle,
            explanation: explanation.sorted(),
        }
    }

    /// Edges of the cycle, in path order.
    pub fn cycle(&self) -> &[EdgeId] {
        &self.cycle
    }

    /// Guards of the conditional edges of the cycle. They cannot all be true together.
    pub fn explanation(&self) -> &Explanation {
        &self.explanation
    }

    /// The clause to learn: at least one guard of the cycle must be false.
    /// Empty if the cycle only involves permanent edges.
    pub fn clause(&self) -> Disjunction {
        self.explanation.iter().map(|l| !l).collect()
    }
}

/// A literal entailed by the current state, together with the literals entailing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Implication {
    pub literal: Lit,
    pub explanation: Explanation,
}

impl Implication {
    /// The clause `explanation -> literal`.
    pub fn clause(&self) -> Disjunction {
        self.explanation
            .iter()
            .map(|l| !l)
            .chain(std::iter::once(self.literal))
            .collect()
    }
}

/// Sum of the weights of the given edges, computed without overflow.
pub(crate) fn total_weight(store: &Store, edges: &[EdgeId]) -> i128 {
    edges.iter().map(|&e| store.edge(e).weight as i128).sum()
}

/// Returns true if the edges form a closed walk, each edge starting where the previous one ends.
pub(crate) fn is_cycle(store: &Store, edges: &[EdgeId]) -> bool {
    match (edges.first(), edges.last()) {
        (Some(&first), Some(&last)) => {
            store.edge(last).target == store.edge(first).source
                && edges
                    .windows(2)
                    .all(|w| store.edge(w[0]).target == store.edge(w[1]).source)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BVar;
    use crate::stn::store::{EdgeKind, Timepoint};

    #[test]
    fn conflict_clause() {
        let mut store = Store::new();
        let a = store.add_timepoint(0, 10).unwrap();
        let b = store.add_timepoint(0, 10).unwrap();
        let l = BVar::from(0usize).true_lit();
        let ab = store.add_edge(a, b, 2, EdgeKind::Permanent).unwrap();
        let ba = store.add_edge(b, a, -3, EdgeKind::Conditional(l)).unwrap();
        let conflict = Conflict::new(&store, vec![ab, ba]);
        assert!(is_cycle(&store, conflict.cycle()));
        assert_eq!(total_weight(&store, conflict.cycle()), -1);
        assert_eq!(conflict.explanation().literals(), &[l]);
        assert_eq!(conflict.clause().literals(), &[!l]);

        let origin_to_a = store.add_edge(Timepoint::ORIGIN, a, 1, EdgeKind::Permanent).unwrap();
        assert!(!is_cycle(&store, &[origin_to_a, ab]));
    }

    #[test]
    fn implication_clause() {
        let p = BVar::from(0usize).true_lit();
        let q = BVar::from(1usize).false_lit();
        let r = BVar::from(2usize).true_lit();
        let imp = Implication {
            literal: r,
            explanation: [p, q, p].into_iter().collect(),
        };
        assert_eq!(imp.explanation.len(), 2);
        assert_eq!(imp.clause().literals(), &[!p, !q, r]);
    }
}

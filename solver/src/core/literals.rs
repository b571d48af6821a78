//! Collections of literals: inline literal sets and clauses.

use crate::core::Lit;
use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};

const INLINE_SIZE: usize = 4;

/// A sequence of literals, optimized to store a few elements inline.
#[derive(PartialEq, Eq, Clone, Hash, Default)]
pub struct Lits {
    elems: SmallVec<[Lit; INLINE_SIZE]>,
}

impl Lits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Lit) {
        self.elems.push(item);
    }

    /// Adds the literal unless it is already present.
    pub fn insert(&mut self, item: Lit) {
        if !self.contains(item) {
            self.elems.push(item);
        }
    }

    pub fn clear(&mut self) {
        self.elems.clear();
    }

    pub fn contains(&self, lit: Lit) -> bool {
        self.elems.contains(&lit)
    }

    pub fn iter(&self) -> impl Iterator<Item = Lit> + '_ {
        self.elems.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn as_slice(&self) -> &[Lit] {
        &self.elems
    }

    /// Sorts the literals and removes duplicates.
    pub fn simplify(&mut self) {
        self.elems.sort_unstable();
        self.elems.dedup();
    }
}

impl Debug for Lits {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}]", self.elems.iter().format(", "))
    }
}

impl FromIterator<Lit> for Lits {
    fn from_iter<T: IntoIterator<Item = Lit>>(iter: T) -> Self {
        Lits {
            elems: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Lits {
    type Item = Lit;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Lit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.elems.iter().copied()
    }
}

/// A set of literals representing a disjunction (a clause).
///
/// Literals are kept sorted and without duplicates.
/// The empty disjunction is the clause that can never be satisfied.
#[derive(PartialEq, Clone, Eq, Hash)]
pub struct Disjunction {
    literals: Vec<Lit>,
}

impl Disjunction {
    pub fn new(mut literals: Vec<Lit>) -> Self {
        literals.sort_unstable();
        literals.dedup();
        Disjunction { literals }
    }

    /// Returns true if the clause contains both a literal and its negation.
    pub fn is_tautology(&self) -> bool {
        // sorted: the two literals of a variable are adjacent
        self.literals.windows(2).any(|w| w[0] == !w[1])
    }

    pub fn literals(&self) -> &[Lit] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn contains(&self, lit: Lit) -> bool {
        self.literals.binary_search(&lit).is_ok()
    }
}

impl Debug for Disjunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.literals.is_empty() {
            write!(f, "false")
        } else {
            write!(f, "{:?}", self.literals.iter().format(" | "))
        }
    }
}

impl<'a> IntoIterator for &'a Disjunction {
    type Item = Lit;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Lit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.literals.iter().copied()
    }
}

impl From<Vec<Lit>> for Disjunction {
    fn from(literals: Vec<Lit>) -> Self {
        Disjunction::new(literals)
    }
}

impl FromIterator<Lit> for Disjunction {
    fn from_iter<T: IntoIterator<Item = Lit>>(iter: T) -> Self {
        Disjunction::new(iter.into_iter().collect())
    }
}

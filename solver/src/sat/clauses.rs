use crate::collections::ref_store::RefVec;
use crate::core::literals::Disjunction;
use crate::core::Lit;
use std::fmt::{Display, Error, Formatter};
use std::ops::Index;

crate::create_ref_type!(ClauseId);

impl Display for ClauseId {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{}", usize::from(*self))
    }
}

/// A disjunction of literals, flagged as learnt if it was derived during search.
///
/// The first two literals (or the only one) are the watched literals of the clause.
#[derive(Clone)]
pub struct Clause {
    pub learnt: bool,
    literals: Vec<Lit>,
}

impl Clause {
    pub fn new(disjuncts: Disjunction, learnt: bool) -> Self {
        Clause {
            learnt,
            literals: disjuncts.literals().to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn disjunction(&self) -> Disjunction {
        Disjunction::new(self.literals.clone())
    }

    fn watched(&self) -> &[Lit] {
        &self.literals[..self.literals.len().min(2)]
    }

    /// Places true literals first, then unassigned ones and finally false ones.
    fn move_watches_front(&mut self, value_of: impl Fn(Lit) -> Option<bool>) {
        self.literals.sort_by_key(|&l| match value_of(l) {
            Some(true) => 0,
            None => 1,
            Some(false) => 2,
        });
    }

    /// Evaluates the clause under a partial assignment.
    pub fn status(&self, value_of: impl Fn(Lit) -> Option<bool>) -> ClauseStatus {
        let mut unassigned = None;
        let mut num_unassigned = 0;
        for &l in &self.literals {
            match value_of(l) {
                Some(true) => return ClauseStatus::Satisfied,
                Some(false) => {}
                None => {
                    num_unassigned += 1;
                    unassigned = Some(l);
                }
            }
        }
        match (num_unassigned, unassigned) {
            (0, _) => ClauseStatus::Violated,
            (1, Some(l)) => ClauseStatus::Unit(l),
            _ => ClauseStatus::Undetermined,
        }
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "[{:?}]", self.disjunction())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClauseStatus {
    Satisfied,
    /// All literals are false but this one, which is unassigned.
    Unit(Lit),
    Violated,
    Undetermined,
}

/// Append-only store of clauses, indexed by their watched literals.
///
/// A clause is only revisited when one of its watched literals becomes false. Unless the clause is
/// unit or violated, a watched literal is either not false or the other one is true.
#[derive(Clone, Default)]
pub struct ClauseDb {
    num_learnt: usize,
    clauses: RefVec<ClauseId, Clause>,
    /// Clauses to revisit when the literal becomes true (they watch its negation).
    watches: RefVec<Lit, Vec<ClauseId>>,
}

impl ClauseDb {
    pub fn new() -> ClauseDb {
        ClauseDb::default()
    }

    /// Adds the clause to the database. It is not watched until [`ClauseDb::watch`] is called.
    pub fn add_clause(&mut self, cl: Clause) -> ClauseId {
        if cl.learnt {
            self.num_learnt += 1;
        }
        self.clauses.push(cl)
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn num_learnt(&self) -> usize {
        self.num_learnt
    }

    pub fn all_clauses(&self) -> impl Iterator<Item = ClauseId> {
        self.clauses.keys()
    }

    fn add_watch(&mut self, id: ClauseId, watched: Lit) {
        let trigger = !watched;
        self.watches.fill_with(trigger, Vec::new);
        self.watches[trigger].push(id);
    }

    /// Selects the watched literals of the clause under the current assignment and registers them.
    /// The clause must not be watched already.
    ///
    /// False literals are only watched if there are not enough other ones: the returned status must
    /// then be handled right away (unit propagation or conflict).
    pub fn watch(&mut self, id: ClauseId, value_of: impl Fn(Lit) -> Option<bool>) -> ClauseStatus {
        self.clauses[id].move_watches_front(&value_of);
        for i in 0..self.clauses[id].watched().len() {
            let l = self.clauses[id].literals[i];
            self.add_watch(id, l);
        }
        self.clauses[id].status(value_of)
    }

    /// Removes the watches of the clause.
    pub fn unwatch(&mut self, id: ClauseId) {
        for i in 0..self.clauses[id].watched().len() {
            let trigger = !self.clauses[id].literals[i];
            if self.watches.contains(trigger) {
                self.watches[trigger].retain(|&c| c != id);
            }
        }
    }

    /// Removes the watches of all clauses.
    pub fn unwatch_all(&mut self) {
        self.watches = RefVec::new();
    }

    /// Moves the clauses to revisit when `lit` becomes true to `out`.
    pub fn take_watchers(&mut self, lit: Lit, out: &mut Vec<ClauseId>) {
        if self.watches.contains(lit) {
            out.append(&mut self.watches[lit]);
        }
    }

    /// Gives back to `lit` a watcher removed by [`ClauseDb::take_watchers`] that was not revisited.
    pub fn restore_watcher(&mut self, lit: Lit, id: ClauseId) {
        self.watches[lit].push(id);
    }

    /// Updates the watches of a clause following the assignment of `p`, whose negation is watched by
    /// the clause. The clause must have been removed from the watchers of `p`.
    ///
    /// If another non-false literal can be watched instead, the watch is moved and
    /// [`ClauseStatus::Undetermined`] is returned. Otherwise the clause keeps watching `!p` and its
    /// status is returned.
    pub fn revisit(&mut self, id: ClauseId, p: Lit, value_of: impl Fn(Lit) -> Option<bool>) -> ClauseStatus {
        let clause = &mut self.clauses[id];
        if clause.literals.len() == 1 {
            debug_assert_eq!(clause.literals[0], !p);
            self.watches[p].push(id);
            return ClauseStatus::Violated;
        }
        if clause.literals[0] == !p {
            clause.literals.swap(0, 1);
        }
        debug_assert_eq!(clause.literals[1], !p);

        let other = clause.literals[0];
        if value_of(other) == Some(true) {
            self.watches[p].push(id);
            return ClauseStatus::Satisfied;
        }
        let replacement = (2..clause.literals.len()).find(|&i| value_of(clause.literals[i]) != Some(false));
        if let Some(i) = replacement {
            clause.literals.swap(1, i);
            let watched = clause.literals[1];
            self.add_watch(id, watched);
            return ClauseStatus::Undetermined;
        }
        self.watches[p].push(id);
        match value_of(other) {
            None => ClauseStatus::Unit(other),
            _ => ClauseStatus::Violated,
        }
    }

    #[cfg(test)]
    fn is_watched_by(&self, lit: Lit, id: ClauseId) -> bool {
        self.watches.get(!lit).is_some_and(|ws| ws.contains(&id))
    }
}

impl Index<ClauseId> for ClauseDb {
    type Output = Clause;
    fn index(&self, k: ClauseId) -> &Self::Output {
        &self.clauses[k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BVar;
    use std::collections::HashMap;

    fn lit(i: usize) -> Lit {
        BVar::from(i).true_lit()
    }

    #[test]
    fn test_status() {
        let a = lit(0);
        let b = lit(1);
        let cl = Clause::new(Disjunction::new(vec![a, !b]), false);
        let assignment = |a_val: Option<bool>, b_val: Option<bool>| {
            move |l: Lit| {
                let v = if l.variable() == a.variable() { a_val } else { b_val };
                v.map(|v| v == l.is_positive())
            }
        };
        assert_eq!(cl.status(assignment(None, None)), ClauseStatus::Undetermined);
        assert_eq!(cl.status(assignment(Some(false), None)), ClauseStatus::Unit(!b));
        assert_eq!(cl.status(assignment(Some(false), Some(true))), ClauseStatus::Violated);
        assert_eq!(cl.status(assignment(None, Some(false))), ClauseStatus::Satisfied);

        let mut db = ClauseDb::new();
        db.add_clause(cl.clone());
        db.add_clause(Clause::new(Disjunction::new(vec![b]), true));
        assert_eq!(db.num_clauses(), 2);
        assert_eq!(db.num_learnt(), 1);
    }

    #[test]
    fn test_watches() {
        let [a, b, c, d] = [lit(0), lit(1), lit(2), lit(3)];
        let mut values: HashMap<Lit, bool> = HashMap::new();
        let set = |values: &mut HashMap<Lit, bool>, l: Lit| {
            values.insert(l, true);
            values.insert(!l, false);
        };
        let value_of = |values: &HashMap<Lit, bool>| {
            let values = values.clone();
            move |l: Lit| values.get(&l).copied()
        };

        let mut db = ClauseDb::new();
        let id = db.add_clause(Clause::new(Disjunction::new(vec![a, b, c, d]), false));
        // a is false before the clause is watched: it is not selected
        set(&mut values, !a);
        assert_eq!(db.watch(id, value_of(&values)), ClauseStatus::Undetermined);
        assert!(!db.is_watched_by(a, id));
        let watched: Vec<Lit> = db[id].watched().to_vec();
        assert_eq!(watched.len(), 2);

        // falsifying a watched literal moves its watch to the remaining unassigned literal
        let first = watched[0];
        set(&mut values, !first);
        let mut watchers = Vec::new();
        db.take_watchers(!first, &mut watchers);
        assert_eq!(watchers, vec![id]);
        assert_eq!(db.revisit(id, !first, value_of(&values)), ClauseStatus::Undetermined);
        assert!(!db.is_watched_by(first, id));
        let remaining: Vec<Lit> = db[id].watched().to_vec();
        assert!(remaining.iter().all(|l| values.get(l).is_none()));

        // one more and the clause is unit
        let second = remaining[0];
        set(&mut values, !second);
        watchers.clear();
        db.take_watchers(!second, &mut watchers);
        assert_eq!(db.revisit(id, !second, value_of(&values)), ClauseStatus::Unit(remaining[1]));
        assert!(db.is_watched_by(second, id));

        // then violated
        set(&mut values, !remaining[1]);
        watchers.clear();
        db.take_watchers(!remaining[1], &mut watchers);
        assert_eq!(db.revisit(id, !remaining[1], value_of(&values)), ClauseStatus::Violated);

        db.unwatch(id);
        assert!(db.all_clauses().all(|c| !db.is_watched_by(remaining[0], c)));
        assert!(db.all_clauses().all(|c| !db.is_watched_by(remaining[1], c)));
    }

    #[test]
    fn test_unit_clause_watch() {
        let a = lit(0);
        let mut db = ClauseDb::new();
        let id = db.add_clause(Clause::new(Disjunction::new(vec![a]), false));
        assert_eq!(db.watch(id, |_| None), ClauseStatus::Unit(a));
        let mut watchers = Vec::new();
        db.take_watchers(!a, &mut watchers);
        assert_eq!(watchers, vec![id]);
        assert_eq!(db.revisit(id, !a, |l| Some(l == !a)), ClauseStatus::Violated);
        assert!(db.is_watched_by(a, id));
    }
}

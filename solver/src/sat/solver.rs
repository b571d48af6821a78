use crate::backtrack::{Backtrack, DecLvl, ObsTrailCursor};
use crate::collections::ref_store::RefVec;
use crate::core::literals::Disjunction;
use crate::core::{BVar, IntCst, Lit};
use crate::error::{InvariantViolation, SetupError, SolverError};
use crate::sat::clauses::{Clause, ClauseDb, ClauseId, ClauseStatus};
use crate::sat::{SatEngine, TheoryConnector};
use crate::stn::{Explanation, StnTheory, Timepoint};
use env_param::EnvParam;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Value given to a variable when it is first decided.
pub static DEFAULT_POLARITY: EnvParam<bool> = EnvParam::new("TEMPO_DEFAULT_POLARITY", "true");

/// A consistent and complete assignment.
#[derive(Clone, Debug)]
pub struct Solution {
    schedule: RefVec<Timepoint, IntCst>,
    assignment: RefVec<BVar, bool>,
}

impl Solution {
    /// Value of the timepoint in the earliest schedule compatible with the assignment.
    pub fn time(&self, tp: Timepoint) -> IntCst {
        self.schedule[tp]
    }

    pub fn schedule(&self) -> &RefVec<Timepoint, IntCst> {
        &self.schedule
    }

    pub fn value(&self, lit: Lit) -> bool {
        self.assignment[lit.variable()] == lit.polarity()
    }
}

#[derive(Clone, Debug)]
pub enum SolveResult {
    Sat(Solution),
    Unsat,
    Timeout,
}

#[derive(Clone, Default, Debug)]
pub struct Stats {
    pub num_decisions: u64,
    pub num_conflicts: u64,
    /// Literals set by unit propagation of clauses.
    pub num_propagations: u64,
    /// Literals set by the theory.
    pub num_theory_propagations: u64,
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# decisions: {}", self.num_decisions)?;
        writeln!(f, "# conflicts: {}", self.num_conflicts)?;
        writeln!(f, "# clause propagations: {}", self.num_propagations)?;
        write!(f, "# theory propagations: {}", self.num_theory_propagations)
    }
}

#[derive(Copy, Clone, Debug)]
struct Decision {
    lit: Lit,
    /// True if this is the second branch of the decision.
    flipped: bool,
}

/// Reason for which propagation stopped before reaching a fixed point.
#[derive(Clone, Debug)]
enum Contradiction {
    /// All literals of the clause are false.
    Clause(ClauseId),
    /// The theory detected a negative cycle, whose guards cannot all be true.
    Theory(Disjunction),
    Invalid(InvariantViolation),
}

/// Receives the inferences of the theory.
#[derive(Clone, Default)]
struct SearchState {
    num_implied: u64,
}

impl SatEngine for SearchState {
    fn propagate(&mut self, literal: Lit, explanation: &Explanation) {
        tracing::trace!(?literal, ?explanation, "theory propagation");
        self.num_implied += 1;
    }

    fn conflict(&mut self, clause: &Disjunction) {
        // picked up from the theory by the next propagation
        tracing::trace!(?clause, "theory conflict");
    }
}

/// A DPLL search over the boolean variables of a [`StnTheory`] and a set of clauses.
///
/// Unassigned variables are decided in index order. Clauses are propagated through two watched
/// literals, driven by the assignments published by the theory. Conflict clauses of the theory are
/// learnt and the search backtracks chronologically. All values are held by the theory.
#[derive(Clone)]
pub struct Solver {
    pub theory: StnTheory,
    clauses: ClauseDb,
    /// Clauses whose watches must be selected before processing new assignments.
    unwatched: Vec<ClauseId>,
    /// Read position in the assignments of the theory.
    assignments: ObsTrailCursor<Lit>,
    /// Buffer for the watchers of the literal being processed.
    working_watches: Vec<ClauseId>,
    connector: TheoryConnector,
    engine: SearchState,
    decisions: Vec<Decision>,
    polarity: bool,
    stats: Stats,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(StnTheory::new())
    }
}

impl Solver {
    pub fn new(theory: StnTheory) -> Solver {
        Solver {
            theory,
            clauses: ClauseDb::new(),
            unwatched: Vec::new(),
            assignments: ObsTrailCursor::new(),
            working_watches: Vec::new(),
            connector: TheoryConnector::new(),
            engine: SearchState::default(),
            decisions: Vec::new(),
            polarity: DEFAULT_POLARITY.get(),
            stats: Stats::default(),
        }
    }

    pub fn set_default_polarity(&mut self, polarity: bool) {
        self.polarity = polarity;
    }

    /// Adds a clause that must hold in any solution. It is taken into account by the next call to `solve`.
    pub fn add_clause(&mut self, clause: impl Into<Disjunction>) -> Result<(), SolverError> {
        let clause = clause.into();
        for l in &clause {
            if usize::from(l.variable()) >= self.theory.num_variables() {
                return Err(SetupError::UnknownVariable(l.variable()).into());
            }
        }
        if !clause.is_tautology() {
            self.clauses.add_clause(Clause::new(clause, false));
        }
        Ok(())
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.num_clauses()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn print_stats(&self) {
        println!("{}", self.stats);
        println!("# learnt clauses: {}", self.clauses.num_learnt());
        self.theory.print_stats();
    }

    /// Undoes all decisions, so that the problem can be extended.
    pub fn reset(&mut self) -> Result<(), SolverError> {
        self.decisions.clear();
        self.theory.backtrack(DecLvl::ROOT)?;
        Ok(())
    }

    /// Searches for an assignment of all variables that satisfies all clauses and is consistent
    /// with the theory. Gives up once the deadline (if any) is reached.
    pub fn solve(&mut self, deadline: Option<Instant>) -> Result<SolveResult, SolverError> {
        let _span = tracing::debug_span!("solve").entered();
        self.reset()?;
        // watches are selected anew for the root assignment
        self.clauses.unwatch_all();
        self.unwatched = self.clauses.all_clauses().collect();
        self.assignments.move_to_end(self.theory.assignments());
        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                tracing::debug!("timeout");
                return Ok(SolveResult::Timeout);
            }
            match self.propagate() {
                Ok(()) => match self.next_decision() {
                    Some(lit) => self.decide(lit)?,
                    None => {
                        tracing::debug!(decisions = self.decisions.len(), "solution");
                        return Ok(SolveResult::Sat(self.solution()));
                    }
                },
                Err(Contradiction::Invalid(err)) => return Err(err.into()),
                Err(contradiction) => {
                    self.stats.num_conflicts += 1;
                    tracing::debug!(lvl = ?self.theory.current_decision_level(), ?contradiction, "conflict");
                    if !self.backtrack_from_conflict(contradiction)? {
                        return Ok(SolveResult::Unsat);
                    }
                }
            }
        }
    }

    fn next_decision(&self) -> Option<Lit> {
        self.theory
            .variables()
            .find(|v| self.theory.value(v.true_lit()).is_none())
            .map(|v| Lit::new(v, self.polarity))
    }

    fn decide(&mut self, lit: Lit) -> Result<(), InvariantViolation> {
        self.stats.num_decisions += 1;
        self.theory.push_checkpoint();
        self.decisions.push(Decision { lit, flipped: false });
        tracing::trace!(?lit, lvl = ?self.theory.current_decision_level(), "decision");
        self.assign(lit)
    }

    /// Sets the literal in the theory.
    /// A conflict is remembered by the theory and picked up by the next propagation.
    fn assign(&mut self, lit: Lit) -> Result<(), InvariantViolation> {
        let before = self.engine.num_implied;
        self.connector.assign(&mut self.theory, lit, &mut self.engine)?;
        self.stats.num_theory_propagations += self.engine.num_implied - before;
        Ok(())
    }

    fn propagate_unit(&mut self, lit: Lit) -> Result<(), Contradiction> {
        self.stats.num_propagations += 1;
        self.assign(lit).map_err(Contradiction::Invalid)?;
        match self.theory.conflict() {
            Some(conflict) => Err(Contradiction::Theory(conflict.clause())),
            None => Ok(()),
        }
    }

    /// Unit propagation of all clauses, together with the theory, until a fixed point.
    fn propagate(&mut self) -> Result<(), Contradiction> {
        if let Some(conflict) = self.theory.conflict() {
            return Err(Contradiction::Theory(conflict.clause()));
        }
        while let Some(id) = self.unwatched.pop() {
            let theory = &self.theory;
            match self.clauses.watch(id, |l| theory.value(l)) {
                ClauseStatus::Satisfied | ClauseStatus::Undetermined => {}
                ClauseStatus::Unit(lit) => self.propagate_unit(lit)?,
                ClauseStatus::Violated => return Err(Contradiction::Clause(id)),
            }
        }
        loop {
            let Some(p) = self.assignments.pop(self.theory.assignments()).copied() else {
                return Ok(());
            };
            let mut watchers = std::mem::take(&mut self.working_watches);
            self.clauses.take_watchers(p, &mut watchers);
            let mut result = Ok(());
            for &id in &watchers {
                if result.is_err() {
                    // not revisited: give back the watch
                    self.clauses.restore_watcher(p, id);
                    continue;
                }
                let theory = &self.theory;
                match self.clauses.revisit(id, p, |l| theory.value(l)) {
                    ClauseStatus::Satisfied | ClauseStatus::Undetermined => {}
                    ClauseStatus::Unit(lit) => result = self.propagate_unit(lit),
                    ClauseStatus::Violated => result = Err(Contradiction::Clause(id)),
                }
            }
            watchers.clear();
            self.working_watches = watchers;
            result?;
        }
    }

    /// Undoes decisions until the latest one whose second branch was not explored, and takes that
    /// branch. A conflict clause of the theory is then learnt.
    /// Returns false if there is no such decision: the problem is unsatisfiable.
    fn backtrack_from_conflict(&mut self, contradiction: Contradiction) -> Result<bool, SolverError> {
        let (learnt, violated) = match contradiction {
            Contradiction::Theory(clause) => (Some(clause), None),
            Contradiction::Clause(id) => (None, Some(id)),
            Contradiction::Invalid(err) => return Err(err.into()),
        };
        let empty = match (&learnt, violated) {
            (Some(clause), _) => clause.is_empty(),
            (None, Some(id)) => self.clauses[id].is_empty(),
            (None, None) => false,
        };
        if empty {
            return Ok(false);
        }
        while let Some(decision) = self.decisions.pop() {
            let parent = self.theory.current_decision_level().parent().unwrap_or(DecLvl::ROOT);
            self.theory.backtrack(parent)?;
            if !decision.flipped {
                self.theory.push_checkpoint();
                self.decisions.push(Decision {
                    lit: !decision.lit,
                    flipped: true,
                });
                tracing::trace!(lit = ?!decision.lit, "flip");
                self.assign(!decision.lit)?;
                if let Some(clause) = learnt {
                    let id = self.clauses.add_clause(Clause::new(clause, true));
                    self.unwatched.push(id);
                }
                if let Some(id) = violated {
                    // its watches are both false and may not be the best ones anymore
                    self.clauses.unwatch(id);
                    self.unwatched.push(id);
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn solution(&self) -> Solution {
        debug_assert!(self.theory.is_consistent());
        Solution {
            schedule: self.theory.earliest_schedule(),
            assignment: self
                .theory
                .variables()
                .map(|v| self.theory.value(v.true_lit()).unwrap_or(self.polarity))
                .collect(),
        }
    }
}

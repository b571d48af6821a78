//! Boundary between the theory and a boolean search engine.
//!
//! The engine pushes literals to the theory with [`TheoryConnector::assign`] and receives,
//! through the [`SatEngine`] trait, the literals implied by the theory and the conflicts it detects.
//! A minimal search engine over this boundary is provided by [`Solver`].

pub mod clauses;
mod solver;

pub use solver::*;

use crate::backtrack::ObsTrailCursor;
use crate::core::literals::Disjunction;
use crate::core::Lit;
use crate::error::InvariantViolation;
use crate::stn::{AssignError, Explanation, Implication, StnTheory};

/// Callbacks through which the theory reports its inferences to a boolean engine.
pub trait SatEngine {
    /// `literal` is entailed by the conjunction of the (true) literals of `explanation`.
    fn propagate(&mut self, literal: Lit, explanation: &Explanation);

    /// The current assignment violates `clause`: the engine must backtrack until it is not violated.
    fn conflict(&mut self, clause: &Disjunction);
}

/// Forwards the inferences of a [`StnTheory`] to a [`SatEngine`], each implication exactly once.
///
/// Implications undone by a backtrack of the theory are forwarded again if they are derived anew.
#[derive(Clone, Default)]
pub struct TheoryConnector {
    cursor: ObsTrailCursor<Implication>,
}

impl TheoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards all implications the engine was not yet notified of.
    pub fn sync(&mut self, theory: &StnTheory, engine: &mut impl SatEngine) {
        while let Some(implication) = self.cursor.pop(theory.implications()) {
            engine.propagate(implication.literal, &implication.explanation);
        }
    }

    /// Assigns the literal in the theory and notifies the engine of the consequences.
    /// Returns false if the assignment resulted in a conflict, and an error if the literal is
    /// unknown to the theory.
    pub fn assign(
        &mut self,
        theory: &mut StnTheory,
        literal: Lit,
        engine: &mut impl SatEngine,
    ) -> Result<bool, InvariantViolation> {
        match theory.assign(literal) {
            Ok(()) => {
                self.sync(theory, engine);
                Ok(true)
            }
            Err(AssignError::Conflict(conflict)) => {
                engine.conflict(&conflict.clause());
                Ok(false)
            }
            Err(AssignError::Invalid(err)) => Err(err),
        }
    }
}

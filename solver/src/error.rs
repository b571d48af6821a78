use crate::backtrack::DecLvl;
use crate::core::BVar;
use crate::stn::{EdgeId, Timepoint};
use thiserror::Error;

/// Malformed input given when building a problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("unknown timepoint {0:?}")]
    UnknownTimepoint(Timepoint),
    #[error("unknown edge {0:?}")]
    UnknownEdge(EdgeId),
    #[error("unknown boolean variable {0:?}")]
    UnknownVariable(BVar),
    #[error("value {value} exceeds the supported magnitude ({max})")]
    OutOfRange { value: i128, max: i128 },
    #[error("empty domain [{lb}, {ub}]")]
    EmptyDomain { lb: i128, ub: i128 },
    #[error("the problem can only be modified at the root level (current: {0:?})")]
    NotAtRoot(DecLvl),
}

/// Misuse of the search interface: unknown checkpoint or literal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("no checkpoint for {requested:?} (current level: {current:?})")]
    UnknownLevel { requested: DecLvl, current: DecLvl },
    #[error("literal of an unknown boolean variable {0:?}")]
    UnknownVariable(BVar),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

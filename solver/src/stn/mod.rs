//! Simple temporal networks with conditional edges, as a theory for a boolean search engine.
//!
//! A network is a set of timepoints and of difference constraints `target - source <= weight`
//! (edges) between them. An edge is either permanent or guarded by a literal, in which case it is
//! only enforced when the literal is true. The [`StnTheory`] maintains the tightest bounds of all
//! timepoints as edges are activated, detects negative cycles and derives the value of literals
//! bound to edges and bounds.

mod config;
mod distances;
mod explain;
mod potential;
mod reif;
mod store;
mod theory;

pub use config::*;
pub use explain::{Conflict, Explanation, Implication};
pub use reif::{Binding, BoundFact};
pub use store::{Direction, Edge, EdgeId, EdgeKind, Timepoint};
pub use theory::*;

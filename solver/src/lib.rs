//! Incremental difference logic for use inside a boolean search.
//!
//! The [`stn::StnTheory`] decides the consistency of a set of difference constraints
//! `target - source <= weight`, some of which are conditioned by boolean literals. It is driven by
//! a boolean engine that assigns literals and opens or closes checkpoints, and reports back
//! conflicts and implied literals with their explanation (see [`sat`]).

pub mod backtrack;
pub mod collections;
pub mod core;
pub mod error;
pub mod sat;
pub mod stn;

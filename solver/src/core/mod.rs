//! Boolean literals and integer constants shared by all components.

mod lit;
pub mod literals;

pub use lit::*;

/// Type representing an integer constant: bounds, edge weights and distances.
#[cfg(not(feature = "i64"))]
pub type IntCst = i32;

/// Type representing an integer constant: bounds, edge weights and distances.
#[cfg(feature = "i64")]
pub type IntCst = i64;

/// Largest magnitude accepted for a bound or an edge weight.
///
/// Potentials are sums of at most two such values (a bound plus a weight) before being
/// compared, and are themselves bounded by it, so no intermediate computation overflows.
pub const MAX_MAGNITUDE: IntCst = IntCst::MAX >> 3;

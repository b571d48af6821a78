//! Containers indexed by small integer handles.

pub mod ref_store;
pub mod set;

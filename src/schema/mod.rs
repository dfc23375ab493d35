//! Schema module - Parameter and option types for room acoustics runs.

mod parameters;

pub use parameters::*;

//! Compute module - Numerical core of the FDTD solver.

mod analysis;
mod grid;
mod neighbours;
mod simulation;
mod stencil;

pub mod gpu;

pub use analysis::*;
pub use grid::*;
pub use neighbours::*;
pub use simulation::*;
pub use stencil::*;

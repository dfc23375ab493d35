//! Room FDTD - Low-frequency room acoustics simulation.
//!
//! This crate time-steps the acoustic wave equation on a uniform cubic grid
//! with an explicit compact FDTD stencil and locally reacting absorbing
//! boundaries, accumulates per-cell listening statistics online, and sweeps
//! candidate source positions over fractional-octave test frequencies to
//! rank them by frequency-response flatness.
//!
//! # Architecture
//!
//! - `schema`: simulation parameters and derived scheme coefficients
//! - `signal`: source sample generators
//! - `compute`: the grid, the stencil and analysis kernels, the simulation
//!   controller, and the wgpu compute back-end
//! - `scene`: room descriptions that paint geometry and materials
//! - `sweep`: the frequency sweep driver and cross-run scoring
//!
//! # Example
//!
//! ```rust,no_run
//! use room_fdtd::{
//!     compute::Simulation,
//!     scene::{Scene, ShoeboxReferenceScene},
//!     schema::SimulationParameters,
//!     signal::SignalGenerator,
//! };
//!
//! let parameters = SimulationParameters::default();
//! let scene = ShoeboxReferenceScene::new();
//! let grid = scene.build(&parameters);
//! let positions = grid.source_set().to_vec();
//!
//! let mut simulation = Simulation::new(grid, parameters).unwrap();
//! simulation.select_source_locations(&positions);
//! simulation.generator = SignalGenerator::sinusoid(63.0);
//! simulation.step(1000).unwrap();
//! ```

pub mod compute;
pub mod scene;
pub mod schema;
pub mod signal;
pub mod sweep;

// Re-export commonly used types
pub use compute::{Simulation, SimulationError, SimulationGrid};
pub use schema::SimulationParameters;
pub use signal::SignalGenerator;

//! Simulation controller - Owns the grid, drives stencil/analysis pairs in
//! lockstep, and enforces the triple-buffer rotation discipline.
//!
//! The controller is the single writer on both the host arrays and, when the
//! device back-end is active, their GPU mirrors. Host/device transfers happen
//! only at `reset`, `sync_read_buffers`, and the end of a `step` batch.

use log::{debug, info};

use crate::schema::SimulationParameters;
use crate::signal::SignalGenerator;

use super::analysis::{analysis_step, ewma_alpha};
use super::gpu::{GpuError, GpuSimulation};
use super::grid::SimulationGrid;
use super::stencil::stencil_step;

/// Errors surfaced by the controller.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Grid must be built before constructing a simulation")]
    GridNotBuilt,

    #[error("Non-finite pressure at cell {cell} after iteration {iteration}")]
    NumericalFailure { cell: usize, iteration: u64 },

    #[error("GPU back-end error: {0}")]
    Gpu(#[from] GpuError),
}

enum Backend {
    Cpu,
    Gpu(Box<GpuSimulation>),
}

/// A bound simulation: one grid, one parameter set, one signal generator.
pub struct Simulation {
    grid: SimulationGrid,
    parameters: SimulationParameters,
    /// Source sample generator, swapped between runs by the sweep driver.
    pub generator: SignalGenerator,
    iteration: u64,
    time: f64,
    backend: Backend,
}

impl Simulation {
    /// Bind a built grid to the CPU back-end.
    pub fn new(
        grid: SimulationGrid,
        parameters: SimulationParameters,
    ) -> Result<Self, SimulationError> {
        if !grid.is_built() {
            return Err(SimulationError::GridNotBuilt);
        }
        let generator = SignalGenerator::sinusoid(parameters.signal_frequency());
        Ok(Self {
            grid,
            parameters,
            generator,
            iteration: 0,
            time: 0.0,
            backend: Backend::Cpu,
        })
    }

    /// Bind a built grid to the wgpu compute back-end.
    ///
    /// The device context, queue, and compiled pipelines live for the
    /// lifetime of the simulation.
    pub async fn new_gpu(
        grid: SimulationGrid,
        parameters: SimulationParameters,
    ) -> Result<Self, SimulationError> {
        if !grid.is_built() {
            return Err(SimulationError::GridNotBuilt);
        }
        let gpu = GpuSimulation::new(&grid, &parameters).await?;
        let generator = SignalGenerator::sinusoid(parameters.signal_frequency());
        Ok(Self {
            grid,
            parameters,
            generator,
            iteration: 0,
            time: 0.0,
            backend: Backend::Gpu(Box::new(gpu)),
        })
    }

    /// Blocking wrapper around [`Simulation::new_gpu`] for synchronous
    /// callers.
    pub fn new_gpu_blocking(
        grid: SimulationGrid,
        parameters: SimulationParameters,
    ) -> Result<Self, SimulationError> {
        pollster::block_on(Self::new_gpu(grid, parameters))
    }

    /// The bound grid.
    #[inline]
    pub fn grid(&self) -> &SimulationGrid {
        &self.grid
    }

    /// Mutable access to the grid for scene rebuilds between runs.
    ///
    /// No other reader exists while the controller is not stepping.
    #[inline]
    pub fn grid_mut(&mut self) -> &mut SimulationGrid {
        &mut self.grid
    }

    /// The bound parameters.
    #[inline]
    pub fn parameters(&self) -> &SimulationParameters {
        &self.parameters
    }

    /// Mutable access to the parameters for between-run reconfiguration.
    #[inline]
    pub fn parameters_mut(&mut self) -> &mut SimulationParameters {
        &mut self.parameters
    }

    /// Completed step count.
    #[inline]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Simulated time `iteration * dt` in seconds.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Whether the device back-end is active.
    #[inline]
    pub fn is_gpu(&self) -> bool {
        matches!(self.backend, Backend::Gpu(_))
    }

    /// Set the `SOURCE` flags to exactly the given positions.
    ///
    /// Takes effect on the device after the next `sync_read_buffers`.
    pub fn select_source_locations(&mut self, positions: &[(usize, usize, usize)]) {
        self.grid.select_source_locations(positions);
    }

    /// Zero pressure and analysis state and rewind the clock.
    pub fn reset(&mut self) {
        self.grid.reset_values();
        self.iteration = 0;
        self.time = 0.0;
        if let Backend::Gpu(gpu) = &mut self.backend {
            gpu.reset(&self.grid);
        }
    }

    /// Re-upload geometry, neighbour masks, β, and scheme coefficients to
    /// the device after a scene rebuild. No-op on the CPU back-end.
    pub fn sync_read_buffers(&mut self) {
        if let Backend::Gpu(gpu) = &mut self.backend {
            gpu.sync_read_buffers(&self.grid, &self.parameters);
        }
    }

    /// Advance exactly `steps` steps.
    ///
    /// Blocks until host-visible pressure and analysis reflect the final
    /// step, then surfaces the first non-finite pressure cell, if any.
    pub fn step(&mut self, steps: u64) -> Result<(), SimulationError> {
        match &mut self.backend {
            Backend::Cpu => {
                let dt = self.parameters.dt();
                let alpha = ewma_alpha(dt, self.parameters.ewma_time_constant());
                let coefficients = self.parameters.coefficients();
                let (width, height) = (self.grid.width(), self.grid.height());

                for _ in 0..steps {
                    let signal = self.generator.generate(self.time, self.iteration);
                    {
                        let (previous, current, next, geometry, neighbours, beta) =
                            self.grid.stencil_buffers();
                        stencil_step(
                            previous,
                            current,
                            next,
                            geometry,
                            neighbours,
                            beta,
                            &coefficients,
                            signal,
                            width,
                            height,
                        );
                    }
                    self.grid.rotate_buffers();
                    {
                        let (pressure, geometry, analysis) = self.grid.analysis_buffers();
                        analysis_step(pressure, geometry, analysis, self.iteration, alpha);
                    }
                    self.iteration += 1;
                    self.time += dt;
                }
            }
            Backend::Gpu(gpu) => {
                let dt = self.parameters.dt();
                let signals: Vec<f32> = (0..steps)
                    .map(|k| {
                        self.generator
                            .generate(self.time + k as f64 * dt, self.iteration + k)
                            as f32
                    })
                    .collect();
                gpu.step_batch(&signals, self.iteration)?;
                gpu.read_back(&mut self.grid)?;
                self.iteration += steps;
                self.time += steps as f64 * dt;
            }
        }

        debug!(
            "advanced {} steps, t = {:.6} s, iteration {}",
            steps, self.time, self.iteration
        );
        self.check_finite()
    }

    /// Log grid and timing characteristics for the current configuration.
    pub fn log_statistics(&self) {
        info!(
            "grid {}x{}x{} = {} cells, dx = {:.4} m, dt = {:.2} µs, backend {}",
            self.grid.width(),
            self.grid.height(),
            self.grid.depth(),
            self.grid.size(),
            self.grid.dx(),
            self.parameters.dt() * 1e6,
            if self.is_gpu() { "gpu" } else { "cpu" },
        );
    }

    fn check_finite(&self) -> Result<(), SimulationError> {
        if let Some(cell) = self
            .grid
            .pressure()
            .iter()
            .position(|value| !value.is_finite())
        {
            return Err(SimulationError::NumericalFailure {
                cell,
                iteration: self.iteration,
            });
        }
        Ok(())
    }
}

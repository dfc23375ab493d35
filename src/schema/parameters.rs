//! Simulation parameters and scheme coefficient derivation.
//!
//! All derived quantities (spatial step, time step, Courant number, stencil
//! coefficients) are recomputed atomically whenever an input changes, so a
//! `SimulationParameters` value is always internally consistent.

use serde::{Deserialize, Serialize};

/// Speed of sound in air at room temperature (m/s).
pub const C_AIR: f64 = 343.0;

/// Reference sound pressure, 20 µPa.
pub const P_REF: f64 = 2e-5;

/// Squared reference pressure, used by Leq conversions.
pub const P_REF_SQUARED: f64 = P_REF * P_REF;

/// Coefficients below this magnitude are flushed to zero so the stencil can
/// elide whole neighbour groups for the SLF scheme.
const COEFFICIENT_EPSILON: f64 = 1e-12;

/// Scalar coefficients of the compact FDTD scheme.
///
/// With free parameters `a = b = 0` these reduce to the standard 7-point
/// (SLF) scheme; nonzero `a`, `b` realise 13/27-point compact schemes over
/// the same three-buffer footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemeCoefficients {
    /// Weight of the 6 axis neighbours.
    pub d1: f64,
    /// Weight of the 12 edge neighbours.
    pub d2: f64,
    /// Weight of the 8 corner neighbours.
    pub d3: f64,
    /// Weight of the cell itself.
    pub d4: f64,
    /// Courant number `c * dt / dx`.
    pub lambda: f64,
}

/// Input and derived parameters of a simulation run.
///
/// Inputs are the target upper frequency, the spatial oversampling factor,
/// the source signal frequency, the EWMA time constant, and the scheme
/// triple `(lambda, a, b)`. Everything else is derived.
#[derive(Debug, Clone)]
pub struct SimulationParameters {
    max_frequency: f64,
    oversampling: f64,
    signal_frequency: f64,
    ewma_time_constant: f64,
    lambda: f64,
    free_a: f64,
    free_b: f64,

    // Derived on every input change.
    sampling_frequency: f64,
    dx: f64,
    dt: f64,
    d1: f64,
    d2: f64,
    d3: f64,
    d4: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        let mut parameters = Self {
            max_frequency: 200.0,
            oversampling: 16.0,
            signal_frequency: 100.0,
            ewma_time_constant: 0.125,
            lambda: 1.0 / 3.0f64.sqrt(),
            free_a: 0.0,
            free_b: 0.0,
            sampling_frequency: 0.0,
            dx: 0.0,
            dt: 0.0,
            d1: 0.0,
            d2: 0.0,
            d3: 0.0,
            d4: 0.0,
        };
        parameters.recalculate();
        parameters
    }
}

impl SimulationParameters {
    /// Create parameters with defaults (200 Hz band, 16x oversampling, SLF).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the design band upper frequency in Hz.
    pub fn set_max_frequency(&mut self, max_frequency: f64) -> Result<(), ParameterError> {
        if !(max_frequency > 0.0) {
            return Err(ParameterError::InvalidMaxFrequency(max_frequency));
        }
        self.max_frequency = max_frequency;
        self.recalculate();
        Ok(())
    }

    /// Set the spatial oversampling factor (points per minimum wavelength).
    pub fn set_oversampling(&mut self, oversampling: f64) -> Result<(), ParameterError> {
        if !(oversampling >= 1.0) {
            return Err(ParameterError::InvalidOversampling(oversampling));
        }
        self.oversampling = oversampling;
        self.recalculate();
        Ok(())
    }

    /// Set the source signal frequency in Hz. Does not affect grid spacing.
    pub fn set_signal_frequency(&mut self, signal_frequency: f64) -> Result<(), ParameterError> {
        if !(signal_frequency > 0.0) {
            return Err(ParameterError::InvalidSignalFrequency(signal_frequency));
        }
        self.signal_frequency = signal_frequency;
        self.recalculate();
        Ok(())
    }

    /// Set the scheme triple `(lambda, a, b)`.
    ///
    /// The caller is responsible for picking a stable combination; the SLF
    /// scheme requires `lambda <= 1/sqrt(3)`, compact schemes allow more.
    pub fn set_scheme(&mut self, lambda: f64, a: f64, b: f64) -> Result<(), ParameterError> {
        if !(lambda > 0.0 && lambda <= 1.0) {
            return Err(ParameterError::InvalidCourantNumber(lambda));
        }
        self.lambda = lambda;
        self.free_a = a;
        self.free_b = b;
        self.recalculate();
        Ok(())
    }

    /// Set the EWMA time constant in seconds (default 125 ms).
    pub fn set_ewma_time_constant(&mut self, tau: f64) -> Result<(), ParameterError> {
        if !(tau > 0.0) {
            return Err(ParameterError::InvalidTimeConstant(tau));
        }
        self.ewma_time_constant = tau;
        self.recalculate();
        Ok(())
    }

    fn recalculate(&mut self) {
        self.sampling_frequency = self.max_frequency * self.oversampling;
        self.dx = C_AIR / self.sampling_frequency;
        self.dt = self.dx * self.lambda / C_AIR;

        let l2 = self.lambda * self.lambda;
        let (a, b) = (self.free_a, self.free_b);
        self.d1 = flush(l2 * (1.0 - 4.0 * a + 4.0 * b));
        self.d2 = flush(l2 * (a - 2.0 * b));
        self.d3 = flush(l2 * b);
        self.d4 = flush(2.0 - 6.0 * l2 + 12.0 * a * l2 - 8.0 * b * l2);
    }

    /// Design band upper frequency (Hz).
    #[inline]
    pub fn max_frequency(&self) -> f64 {
        self.max_frequency
    }

    /// Spatial oversampling factor.
    #[inline]
    pub fn oversampling(&self) -> f64 {
        self.oversampling
    }

    /// Current source signal frequency (Hz).
    #[inline]
    pub fn signal_frequency(&self) -> f64 {
        self.signal_frequency
    }

    /// EWMA time constant (s).
    #[inline]
    pub fn ewma_time_constant(&self) -> f64 {
        self.ewma_time_constant
    }

    /// Spatial sampling frequency `f_max * oversampling` (Hz).
    #[inline]
    pub fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    /// Cell size (m).
    #[inline]
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Time step (s).
    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Courant number.
    #[inline]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Scheme free parameters `(a, b)`.
    #[inline]
    pub fn free_parameters(&self) -> (f64, f64) {
        (self.free_a, self.free_b)
    }

    /// Scalar stencil coefficients for the current scheme.
    #[inline]
    pub fn coefficients(&self) -> SchemeCoefficients {
        SchemeCoefficients {
            d1: self.d1,
            d2: self.d2,
            d3: self.d3,
            d4: self.d4,
            lambda: self.lambda,
        }
    }
}

#[inline]
fn flush(value: f64) -> f64 {
    if value.abs() < COEFFICIENT_EPSILON { 0.0 } else { value }
}

/// Invalid parameter combinations, surfaced at setup time.
#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("Maximum frequency must be positive, got {0}")]
    InvalidMaxFrequency(f64),
    #[error("Oversampling must be at least 1, got {0}")]
    InvalidOversampling(f64),
    #[error("Signal frequency must be positive, got {0}")]
    InvalidSignalFrequency(f64),
    #[error("Courant number must be in (0, 1], got {0}")]
    InvalidCourantNumber(f64),
    #[error("EWMA time constant must be positive, got {0}")]
    InvalidTimeConstant(f64),
}

/// Sweep driver options, parsed from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOptions {
    /// Simulated time per run (s).
    pub simulated_time: f64,
    /// Design band upper frequency (Hz).
    pub max_frequency: f64,
    /// Spatial oversampling factor.
    pub oversampling: f64,
    /// Fractional octave denominator for test frequencies.
    pub bands: f64,
    /// Number of simultaneous sources per candidate set.
    pub speakers: usize,
    /// Minimum pairwise distance between sources (m).
    pub min_distance: f64,
    /// Scene name.
    pub scene: String,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            simulated_time: 0.3,
            max_frequency: 200.0,
            oversampling: 16.0,
            bands: 24.0,
            speakers: 1,
            min_distance: 2.0,
            scene: "shoebox".to_string(),
        }
    }
}

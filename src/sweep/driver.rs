//! Sweep driver - Runs every candidate source position over a ladder of
//! fractional-octave test frequencies and scores frequency-response
//! flatness.
//!
//! One run = one (position set, frequency) pair: re-paint materials, reset
//! the simulation, advance a fixed simulated time, then reduce the Leq
//! channel over the listener cells. A numerical failure invalidates the
//! whole position (not just the frequency) and the driver moves on to the
//! next candidate.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::compute::{AnalysisKey, LISTENER_FLAG, Simulation, SimulationError, SimulationGrid};
use crate::scene::Scene;
use crate::signal::SignalGenerator;

use super::aggregator::CrossRunAggregator;
use super::octaves::octave_centre_frequencies;
use super::record::SweepRecord;
use super::weighting::a_weighting;

/// Sweep-wide configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Simulated time per run (s).
    pub simulated_time: f64,
    /// Lowest test frequency (Hz).
    pub lower_frequency: f64,
    /// Highest test frequency (Hz).
    pub upper_frequency: f64,
    /// Fractional octave denominator for the frequency ladder.
    pub band_fraction: f64,
    /// Apply the A-weighting correction to per-band SPL.
    pub apply_a_weighting: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            simulated_time: 0.3,
            lower_frequency: 20.0,
            upper_frequency: 200.0,
            band_fraction: 24.0,
            apply_a_weighting: false,
        }
    }
}

/// A position set whose sweep was aborted.
#[derive(Debug)]
pub struct SweepFailure {
    /// Position-set index in input order.
    pub index: usize,
    /// The error that aborted the sweep vector.
    pub error: SimulationError,
}

/// Result of a full sweep.
pub struct SweepReport {
    /// The frequency ladder shared by all records, ascending.
    pub frequencies: Vec<f64>,
    /// One record per completed position set, input order.
    pub records: Vec<SweepRecord>,
    /// Position sets whose runs were aborted.
    pub failures: Vec<SweepFailure>,
    /// Per-cell Leq statistics across all completed runs.
    pub aggregator: CrossRunAggregator,
}

impl SweepReport {
    /// Indices of the completed records ordered best (flattest) first.
    /// Ties keep input order.
    pub fn ranked_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|&a, &b| {
            self.records[a]
                .deviation
                .partial_cmp(&self.records[b].deviation)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }
}

/// Sweep configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("No candidate source positions to sweep")]
    NoCandidatePositions,

    #[error("No test frequencies inside {0}..{1} Hz")]
    EmptyFrequencyLadder(f64, f64),
}

/// Mean/min/max of Leq over the listener cells, skipping NaN.
///
/// Returns zeros when no listener cell carries a finite value.
pub fn listener_spl_stats(grid: &SimulationGrid) -> (f64, f64, f64) {
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;

    for (cell, &flags) in grid.geometry().iter().enumerate() {
        if flags & LISTENER_FLAG == 0 {
            continue;
        }
        let value = grid.analysis_value(cell, AnalysisKey::Leq);
        if value.is_nan() {
            continue;
        }
        sum += value;
        count += 1;
        low = low.min(value);
        high = high.max(value);
    }

    if count == 0 {
        return (0.0, 0.0, 0.0);
    }
    (sum / count as f64, low, high)
}

/// Sweep every candidate position set and score its flatness.
pub fn run_sweep(
    simulation: &mut Simulation,
    scene: &dyn Scene,
    position_sets: &[Vec<(usize, usize, usize)>],
    config: &SweepConfig,
) -> Result<SweepReport, SweepError> {
    if position_sets.is_empty() {
        return Err(SweepError::NoCandidatePositions);
    }
    let frequencies = octave_centre_frequencies(
        config.lower_frequency,
        config.upper_frequency,
        config.band_fraction,
        false,
    );
    if frequencies.is_empty() {
        return Err(SweepError::EmptyFrequencyLadder(
            config.lower_frequency,
            config.upper_frequency,
        ));
    }
    let runtime_steps = (config.simulated_time / simulation.parameters().dt()).ceil() as u64;

    info!("---- Starting sweep ----");
    info!("{} position set(s)", position_sets.len());
    info!("{} steps per run", runtime_steps);
    info!("{} test frequencies", frequencies.len());

    let mut records = Vec::new();
    let mut failures = Vec::new();
    let mut aggregator = CrossRunAggregator::new(simulation.grid().size());

    for (index, positions) in position_sets.iter().enumerate() {
        simulation.select_source_locations(positions);
        info!(
            "position set {}/{}: {:?}",
            index + 1,
            position_sets.len(),
            positions
        );
        let start = Instant::now();

        let mut band_spl = Vec::with_capacity(frequencies.len());
        let mut aborted = None;
        for &frequency in &frequencies {
            if let Err(error) = run_single(simulation, scene, frequency, runtime_steps) {
                warn!("[{index}] {frequency:.2} Hz aborted: {error}");
                aborted = Some(error);
                break;
            }
            let (avg_spl, _, _) = listener_spl_stats(simulation.grid());
            let corrected = if config.apply_a_weighting {
                avg_spl + a_weighting(frequency)
            } else {
                avg_spl
            };
            band_spl.push(corrected);
            aggregator.accumulate(simulation.grid());
            info!("[{index}] {frequency:.2} Hz: {corrected:.2} dB");
        }

        if let Some(error) = aborted {
            failures.push(SweepFailure { index, error });
            continue;
        }

        let deviation: f64 = band_spl
            .windows(2)
            .map(|pair| (pair[1] - pair[0]) * (pair[1] - pair[0]))
            .sum();
        let avg_spl = band_spl.iter().sum::<f64>() / band_spl.len() as f64;
        info!(
            "[{index}] deviation {deviation:.4}, elapsed {:.1} s",
            start.elapsed().as_secs_f64()
        );

        records.push(SweepRecord {
            timestamp: unix_now(),
            index,
            positions: positions.clone(),
            deviation,
            avg_spl,
            band_spl,
        });
    }

    Ok(SweepReport {
        frequencies,
        records,
        failures,
        aggregator,
    })
}

fn run_single(
    simulation: &mut Simulation,
    scene: &dyn Scene,
    frequency: f64,
    runtime_steps: u64,
) -> Result<(), SimulationError> {
    // The frequency comes off a positive ladder, so the setter cannot fail.
    let _ = simulation.parameters_mut().set_signal_frequency(frequency);
    simulation.generator = SignalGenerator::sinusoid(frequency);

    let parameters = simulation.parameters().clone();
    scene.rebuild(simulation.grid_mut(), &parameters);
    simulation.reset();
    simulation.sync_read_buffers();
    simulation.step(runtime_steps)
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

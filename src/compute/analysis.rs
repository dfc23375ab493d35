//! Analysis kernel - Per-cell online statistics over the pressure field.
//!
//! After every stencil step the freshly rotated current pressure feeds a
//! Welford-style running mean, a running mean square (exposed as RMS and
//! Leq), and an exponentially weighted moving average with its dB form.
//! Cells are independent; wall cells hold NaN and are never touched, and a
//! NaN pressure sample skips the update entirely.

use rayon::prelude::*;

use crate::schema::P_REF_SQUARED;

use super::grid::{ANALYSIS_CHANNELS, AnalysisKey, WALL_FLAG};

/// Accumulate one step of statistics for every non-wall cell.
///
/// `iteration` is the zero-based index of the step that produced `pressure`;
/// the sample count used by the running means is `iteration + 1`.
/// `ewma_alpha` is the precomputed blend factor `1 - exp(-dt / tau)`.
pub fn analysis_step(
    pressure: &[f64],
    geometry: &[u8],
    analysis: &mut [f64],
    iteration: u64,
    ewma_alpha: f64,
) {
    let samples = (iteration + 1) as f64;

    analysis
        .par_chunks_mut(ANALYSIS_CHANNELS)
        .enumerate()
        .for_each(|(cell, channels)| {
            if geometry[cell] & WALL_FLAG != 0 {
                return;
            }
            let sample = pressure[cell];
            if sample.is_nan() {
                return;
            }
            let squared = sample * sample;

            let mean = &mut channels[AnalysisKey::MeanPressure as usize];
            *mean += (sample - *mean) / samples;

            let mean_square = {
                let slot = &mut channels[AnalysisKey::MeanSquare as usize];
                *slot += (squared - *slot) / samples;
                *slot
            };
            channels[AnalysisKey::Rms as usize] = mean_square.sqrt();
            channels[AnalysisKey::Leq as usize] = level_db(mean_square);

            let ewma = {
                let slot = &mut channels[AnalysisKey::Ewma as usize];
                *slot += (squared - *slot) * ewma_alpha;
                *slot
            };
            channels[AnalysisKey::EwmaL as usize] = level_db(ewma);
        });
}

/// Convert a mean-square pressure to dB re 20 µPa.
#[inline]
pub fn level_db(mean_square: f64) -> f64 {
    10.0 * (mean_square / P_REF_SQUARED).log10()
}

/// Blend factor for an EWMA with time constant `tau` sampled every `dt`.
#[inline]
pub fn ewma_alpha(dt: f64, tau: f64) -> f64 {
    1.0 - (-dt / tau).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::grid::{ANALYSIS_CHANNELS, AnalysisKey};

    fn run_steps(pressure_per_step: &[Vec<f64>], geometry: &[u8], alpha: f64) -> Vec<f64> {
        let cells = geometry.len();
        let mut analysis = vec![0.0; cells * ANALYSIS_CHANNELS];
        for (cell, &flags) in geometry.iter().enumerate() {
            if flags & WALL_FLAG != 0 {
                let base = cell * ANALYSIS_CHANNELS;
                analysis[base..base + ANALYSIS_CHANNELS].fill(f64::NAN);
            }
        }
        for (iteration, pressure) in pressure_per_step.iter().enumerate() {
            analysis_step(pressure, geometry, &mut analysis, iteration as u64, alpha);
        }
        analysis
    }

    fn channel(analysis: &[f64], cell: usize, key: AnalysisKey) -> f64 {
        analysis[cell * ANALYSIS_CHANNELS + key as usize]
    }

    #[test]
    fn test_constant_signal_identities() {
        // Invariant: after N steps of constant pressure k, the mean and the
        // RMS both equal k.
        let k = 0.75;
        let steps: Vec<Vec<f64>> = (0..50).map(|_| vec![k; 4]).collect();
        let geometry = vec![0u8; 4];
        let analysis = run_steps(&steps, &geometry, ewma_alpha(1e-4, 0.125));

        for cell in 0..4 {
            assert!((channel(&analysis, cell, AnalysisKey::MeanPressure) - k).abs() < 1e-12);
            assert!((channel(&analysis, cell, AnalysisKey::Rms) - k).abs() < 1e-12);
            let expected_leq = 10.0 * (k * k / P_REF_SQUARED).log10();
            assert!((channel(&analysis, cell, AnalysisKey::Leq) - expected_leq).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mean_matches_batch_average() {
        let values = [0.3, -0.8, 1.4, 0.05, -0.2, 0.9];
        let steps: Vec<Vec<f64>> = values.iter().map(|&v| vec![v]).collect();
        let analysis = run_steps(&steps, &[0u8], 0.5);

        let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        let mean_square: f64 =
            values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
        assert!((channel(&analysis, 0, AnalysisKey::MeanPressure) - mean).abs() < 1e-12);
        assert!((channel(&analysis, 0, AnalysisKey::Rms) - mean_square.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_wall_cells_stay_nan() {
        let steps: Vec<Vec<f64>> = (0..10).map(|_| vec![1.0, 1.0]).collect();
        let geometry = [WALL_FLAG, 0u8];
        let analysis = run_steps(&steps, &geometry, 0.5);

        assert!(channel(&analysis, 0, AnalysisKey::MeanPressure).is_nan());
        assert!(channel(&analysis, 0, AnalysisKey::EwmaL).is_nan());
        assert!((channel(&analysis, 1, AnalysisKey::MeanPressure) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nan_sample_skips_update() {
        let steps = vec![vec![2.0], vec![f64::NAN], vec![2.0]];
        let analysis = run_steps(&steps, &[0u8], 0.5);

        // The NaN step contributes nothing; the accumulators stay finite.
        let mean = channel(&analysis, 0, AnalysisKey::MeanPressure);
        assert!(mean.is_finite());
        assert!(mean > 0.0);
    }

    #[test]
    fn test_ewma_tracks_recent_power() {
        let alpha = ewma_alpha(1e-3, 0.125);
        // Loud then quiet: EWMA must decay towards the new power level.
        let mut steps: Vec<Vec<f64>> = (0..200).map(|_| vec![1.0]).collect();
        steps.extend((0..2000).map(|_| vec![0.01]));
        let analysis = run_steps(&steps, &[0u8], alpha);

        let ewma = channel(&analysis, 0, AnalysisKey::Ewma);
        assert!(ewma < 0.05, "EWMA failed to decay, got {ewma}");
        assert!(ewma > 0.0);

        let ewma_l = channel(&analysis, 0, AnalysisKey::EwmaL);
        assert!((ewma_l - level_db(ewma)).abs() < 1e-9);
    }

    #[test]
    fn test_level_db_reference() {
        // mean square equal to the squared reference pressure is 0 dB.
        assert!((level_db(P_REF_SQUARED)).abs() < 1e-12);
        assert!((level_db(P_REF_SQUARED * 100.0) - 20.0).abs() < 1e-9);
    }
}

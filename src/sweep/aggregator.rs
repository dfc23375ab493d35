//! Cross-run aggregation - Per-cell Welford accumulation of Leq across
//! frequency-band runs, reduced to a variance map and a 0..1 ranking map.

use crate::compute::{AnalysisKey, SimulationGrid};

/// Online per-cell mean/variance accumulator over repeated runs.
///
/// NaN inputs (wall cells) propagate through the accumulator and map to a
/// ranking of zero, so walls never rank.
#[derive(Debug, Clone)]
pub struct CrossRunAggregator {
    mean: Vec<f64>,
    m2: Vec<f64>,
    runs: u64,
}

impl CrossRunAggregator {
    /// Accumulator for `cells` grid cells.
    pub fn new(cells: usize) -> Self {
        Self {
            mean: vec![0.0; cells],
            m2: vec![0.0; cells],
            runs: 0,
        }
    }

    /// Number of accumulated runs.
    #[inline]
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Fold one finished run's Leq channel into the accumulator.
    pub fn accumulate(&mut self, grid: &SimulationGrid) {
        debug_assert_eq!(self.mean.len(), grid.size());
        self.runs += 1;
        let count = self.runs as f64;
        for cell in 0..self.mean.len() {
            let value = grid.analysis_value(cell, AnalysisKey::Leq);
            let delta_old = value - self.mean[cell];
            self.mean[cell] += delta_old / count;
            let delta_new = value - self.mean[cell];
            self.m2[cell] += delta_old * delta_new;
        }
    }

    /// Per-cell population variance of Leq across the accumulated runs.
    pub fn variance(&self) -> Vec<f64> {
        if self.runs == 0 {
            return vec![f64::NAN; self.mean.len()];
        }
        let count = self.runs as f64;
        self.m2.iter().map(|&m2| m2 / count).collect()
    }

    /// Ranking map in [0, 1]: 1 at the lowest-variance cell, 0 at the
    /// highest. Cells with a non-finite variance rank 0.
    pub fn ranking(&self) -> Vec<f64> {
        let variance = self.variance();
        let mut low = f64::INFINITY;
        let mut high = f64::NEG_INFINITY;
        for &v in &variance {
            if v.is_finite() {
                low = low.min(v);
                high = high.max(v);
            }
        }
        if !low.is_finite() {
            return vec![0.0; variance.len()];
        }
        let range = high - low;

        variance
            .iter()
            .map(|&v| {
                if !v.is_finite() {
                    return 0.0;
                }
                if range == 0.0 {
                    return 1.0;
                }
                1.0 - (v - low) / range
            })
            .collect()
    }
}

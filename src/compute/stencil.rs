//! Stencil kernel - One explicit FDTD time step over the pressure field.
//!
//! For every non-wall cell the next pressure is a compact-scheme combination
//! of the current pressure at up to 26 neighbours, the cell's own current and
//! previous pressure, and, for cells missing axis neighbours, a locally
//! reacting absorbing-boundary blend driven by the cell's reflection
//! coefficient. Cells are fully independent, so the sweep parallelises over
//! contiguous rows along the fastest-varying axis.

use rayon::prelude::*;

use crate::schema::SchemeCoefficients;

use super::grid::{SOURCE_FLAG, WALL_FLAG};
use super::neighbours::{AXIS_BITS, AXIS_COUNT, EDGE_COUNT, offset_strides};

/// Advance the pressure field one step, writing into `next`.
///
/// `signal` is the source sample for this step; NaN suppresses injection.
/// Exactly one write to `next` happens per cell.
pub fn stencil_step(
    previous: &[f64],
    current: &[f64],
    next: &mut [f64],
    geometry: &[u8],
    neighbours: &[u32],
    beta: &[f64],
    coefficients: &SchemeCoefficients,
    signal: f64,
    width: usize,
    height: usize,
) {
    let strides = offset_strides(width, height);
    let inject = signal.is_finite();

    next.par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, next_row)| {
            let base = row * width;
            for (w, next_cell) in next_row.iter_mut().enumerate() {
                let index = base + w;
                let flags = geometry[index];
                if flags & WALL_FLAG != 0 {
                    *next_cell = 0.0;
                    continue;
                }
                if flags & SOURCE_FLAG != 0 && inject {
                    *next_cell = signal;
                    continue;
                }
                *next_cell = update_cell(
                    index,
                    previous,
                    current,
                    neighbours[index],
                    beta[index],
                    coefficients,
                    &strides,
                );
            }
        });
}

/// Compact-scheme update for a single cell.
#[inline]
fn update_cell(
    index: usize,
    previous: &[f64],
    current: &[f64],
    mask: u32,
    beta: f64,
    coefficients: &SchemeCoefficients,
    strides: &[isize; 26],
) -> f64 {
    let mut axis_sum = 0.0;
    for bit in 0..AXIS_COUNT {
        if mask & (1 << bit) != 0 {
            axis_sum += current[(index as isize + strides[bit]) as usize];
        }
    }

    let mut edge_sum = 0.0;
    if coefficients.d2 != 0.0 {
        for bit in AXIS_COUNT..AXIS_COUNT + EDGE_COUNT {
            if mask & (1 << bit) != 0 {
                edge_sum += current[(index as isize + strides[bit]) as usize];
            }
        }
    }

    let mut corner_sum = 0.0;
    if coefficients.d3 != 0.0 {
        for bit in AXIS_COUNT + EDGE_COUNT..strides.len() {
            if mask & (1 << bit) != 0 {
                corner_sum += current[(index as isize + strides[bit]) as usize];
            }
        }
    }

    let open = coefficients.d1 * axis_sum
        + coefficients.d2 * edge_sum
        + coefficients.d3 * corner_sum
        + coefficients.d4 * current[index]
        - previous[index];

    let present_axes = (mask & AXIS_BITS).count_ones();
    if present_axes < AXIS_COUNT as u32 {
        let gamma = (AXIS_COUNT as u32 - present_axes) as f64 * coefficients.lambda * beta;
        (open + gamma * previous[index]) / (1.0 + gamma)
    } else {
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::grid::{Region, SimulationGrid, WALL_FLAG};
    use crate::compute::neighbours::NEIGHBOUR_OFFSETS;
    use crate::schema::SimulationParameters;

    /// Straightforward scalar reference of the per-cell rule from the
    /// coordinate form, without masks or strides.
    fn reference_step(
        previous: &[f64],
        current: &[f64],
        geometry: &[u8],
        beta: &[f64],
        coefficients: &SchemeCoefficients,
        width: usize,
        height: usize,
        depth: usize,
    ) -> Vec<f64> {
        let mut next = vec![0.0; current.len()];
        for d in 0..depth {
            for h in 0..height {
                for w in 0..width {
                    let index = (d * height + h) * width + w;
                    if geometry[index] & WALL_FLAG != 0 {
                        continue;
                    }
                    let mut sums = [0.0f64; 3];
                    let mut axes_present = 0u32;
                    for (bit, &(dw, dh, dd)) in NEIGHBOUR_OFFSETS.iter().enumerate() {
                        let nw = w as i32 + dw;
                        let nh = h as i32 + dh;
                        let nd = d as i32 + dd;
                        if nw < 0
                            || nh < 0
                            || nd < 0
                            || nw >= width as i32
                            || nh >= height as i32
                            || nd >= depth as i32
                        {
                            continue;
                        }
                        let n = (nd as usize * height + nh as usize) * width + nw as usize;
                        if geometry[n] & WALL_FLAG != 0 {
                            continue;
                        }
                        let group = if bit < 6 {
                            0
                        } else if bit < 18 {
                            1
                        } else {
                            2
                        };
                        sums[group] += current[n];
                        if group == 0 {
                            axes_present += 1;
                        }
                    }
                    let open = coefficients.d1 * sums[0]
                        + coefficients.d2 * sums[1]
                        + coefficients.d3 * sums[2]
                        + coefficients.d4 * current[index]
                        - previous[index];
                    next[index] = if axes_present < 6 {
                        let gamma =
                            (6 - axes_present) as f64 * coefficients.lambda * beta[index];
                        (open + gamma * previous[index]) / (1.0 + gamma)
                    } else {
                        open
                    };
                }
            }
        }
        next
    }

    fn built_grid(shape: (f64, f64, f64)) -> SimulationGrid {
        let mut grid = SimulationGrid::new(shape, &SimulationParameters::default());
        grid.edge_betas.set_all(0.25);
        grid.fill_region(
            Region {
                h_max: grid.dx() * 0.9,
                ..Region::default()
            },
            WALL_FLAG,
            Some(0.6),
        );
        grid.build();
        grid
    }

    #[test]
    fn test_matches_scalar_reference_slf() {
        let grid = built_grid((0.8, 0.8, 0.8));
        let parameters = SimulationParameters::default();
        let coefficients = parameters.coefficients();

        let size = grid.size();
        let current: Vec<f64> = (0..size).map(|i| ((i * 37) % 17) as f64 * 0.1 - 0.8).collect();
        let previous: Vec<f64> = (0..size).map(|i| ((i * 13) % 11) as f64 * 0.05).collect();

        let expected = reference_step(
            &previous,
            &current,
            grid.geometry(),
            grid.beta(),
            &coefficients,
            grid.width(),
            grid.height(),
            grid.depth(),
        );

        let mut next = vec![0.0; size];
        stencil_step(
            &previous,
            &current,
            &mut next,
            grid.geometry(),
            grid.neighbours(),
            grid.beta(),
            &coefficients,
            f64::NAN,
            grid.width(),
            grid.height(),
        );

        for i in 0..size {
            assert!(
                (next[i] - expected[i]).abs() < 1e-12,
                "cell {i}: {} vs {}",
                next[i],
                expected[i]
            );
        }
    }

    #[test]
    fn test_matches_scalar_reference_compact() {
        let mut parameters = SimulationParameters::default();
        parameters.set_scheme(1.0, 0.25, 1.0 / 16.0).unwrap();
        let coefficients = parameters.coefficients();

        let mut grid = SimulationGrid::new((0.7, 0.7, 0.7), &parameters);
        grid.edge_betas.set_all(0.1);
        grid.build();

        let size = grid.size();
        let current: Vec<f64> = (0..size).map(|i| (i as f64 * 0.618).sin()).collect();
        let previous: Vec<f64> = (0..size).map(|i| (i as f64 * 0.314).cos()).collect();

        let expected = reference_step(
            &previous,
            &current,
            grid.geometry(),
            grid.beta(),
            &coefficients,
            grid.width(),
            grid.height(),
            grid.depth(),
        );

        let mut next = vec![0.0; size];
        stencil_step(
            &previous,
            &current,
            &mut next,
            grid.geometry(),
            grid.neighbours(),
            grid.beta(),
            &coefficients,
            f64::NAN,
            grid.width(),
            grid.height(),
        );

        for i in 0..size {
            assert!(
                (next[i] - expected[i]).abs() < 1e-12,
                "cell {i}: {} vs {}",
                next[i],
                expected[i]
            );
        }
    }

    #[test]
    fn test_wall_cells_write_zero() {
        let grid = built_grid((0.5, 0.5, 0.5));
        let parameters = SimulationParameters::default();
        let size = grid.size();

        let current = vec![1.0; size];
        let previous = vec![1.0; size];
        let mut next = vec![7.0; size];
        stencil_step(
            &previous,
            &current,
            &mut next,
            grid.geometry(),
            grid.neighbours(),
            grid.beta(),
            &parameters.coefficients(),
            f64::NAN,
            grid.width(),
            grid.height(),
        );

        for (i, &flags) in grid.geometry().iter().enumerate() {
            if flags & WALL_FLAG != 0 {
                assert_eq!(next[i], 0.0, "wall cell {i} must be zeroed");
            }
        }
    }

    #[test]
    fn test_source_injection_overwrites() {
        let mut grid = SimulationGrid::new((0.5, 0.5, 0.5), &SimulationParameters::default());
        let source = grid.position(0.25, 0.25, 0.25);
        grid.mark_cell(source, crate::compute::grid::SOURCE_REGION_FLAG);
        grid.build();
        grid.select_source_locations(&[source]);

        let parameters = SimulationParameters::default();
        let size = grid.size();
        let current = vec![0.5; size];
        let previous = vec![0.5; size];
        let mut next = vec![0.0; size];

        stencil_step(
            &previous,
            &current,
            &mut next,
            grid.geometry(),
            grid.neighbours(),
            grid.beta(),
            &parameters.coefficients(),
            0.125,
            grid.width(),
            grid.height(),
        );
        let index = grid.index(source.0, source.1, source.2);
        assert_eq!(next[index], 0.125);

        // NaN signal leaves the source cell to the regular update.
        stencil_step(
            &previous,
            &current,
            &mut next,
            grid.geometry(),
            grid.neighbours(),
            grid.beta(),
            &parameters.coefficients(),
            f64::NAN,
            grid.width(),
            grid.height(),
        );
        assert!(next[index].is_finite());
        assert_ne!(next[index], 0.125);
    }

    #[test]
    fn test_plane_wave_causality() {
        // 64x1x1 chain: the numerical domain of dependence grows one cell
        // per step, so the far end must stay exactly zero until step 63.
        let mut parameters = SimulationParameters::default();
        parameters.set_oversampling(16.0).unwrap();
        let coefficients = parameters.coefficients();

        let width = 64usize;
        let geometry = vec![0u8; width];
        let mut neighbours = vec![0u32; width];
        super::super::neighbours::populate_neighbours(&geometry, &mut neighbours, width, 1, 1);
        let beta = vec![0.0; width];

        let mut previous = vec![0.0; width];
        let mut current = vec![0.0; width];
        let mut next = vec![0.0; width];
        current[0] = 1.0;

        for step in 1..width {
            stencil_step(
                &previous,
                &current,
                &mut next,
                &geometry,
                &neighbours,
                &beta,
                &coefficients,
                f64::NAN,
                width,
                1,
            );
            std::mem::swap(&mut previous, &mut current);
            std::mem::swap(&mut current, &mut next);

            if step < width - 1 {
                assert_eq!(current[width - 1], 0.0, "front arrived early at step {step}");
            }
        }
        assert_ne!(current[width - 1], 0.0, "front never arrived");
    }
}

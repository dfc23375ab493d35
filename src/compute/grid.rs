//! Simulation grid - Geometry flags, neighbour masks, reflection
//! coefficients, triple-buffered pressure, and stacked analysis channels.
//!
//! The grid exclusively owns its arrays. The stencil and analysis kernels
//! borrow them for the duration of a step; the GPU back-end keeps mirrored
//! buffers that the controller synchronises at explicit transfer points.
//!
//! Data is stored as flat arrays with indexing `(d * height + h) * width + w`
//! so the w axis is the fastest-varying (contiguous) one.

use crate::schema::SimulationParameters;

use super::neighbours::{AXIS_COUNT, NEIGHBOUR_OFFSETS, populate_neighbours};

/// Geometry flag: cell is solid, never updates pressure.
pub const WALL_FLAG: u8 = 1 << 0;
/// Geometry flag: a source may be placed at this cell.
pub const SOURCE_REGION_FLAG: u8 = 1 << 1;
/// Geometry flag: cell currently carries an active source.
pub const SOURCE_FLAG: u8 = 1 << 2;
/// Geometry flag: cell participates in listener reductions.
pub const LISTENER_FLAG: u8 = 1 << 3;

/// Stacked per-cell analysis channels, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum AnalysisKey {
    /// Welford running mean of pressure.
    MeanPressure = 0,
    /// Welford running mean of squared pressure.
    MeanSquare = 1,
    /// `sqrt(mean(P^2))`.
    Rms = 2,
    /// Equivalent sound pressure level in dB re 20 µPa.
    Leq = 3,
    /// Exponentially weighted mean of squared pressure.
    Ewma = 4,
    /// dB form of the EWMA channel.
    EwmaL = 5,
}

/// Number of stacked analysis channels.
pub const ANALYSIS_CHANNELS: usize = 6;

/// Reflection coefficients of the six outer faces of the domain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeBetas {
    pub width_min: f64,
    pub width_max: f64,
    pub height_min: f64,
    pub height_max: f64,
    pub depth_min: f64,
    pub depth_max: f64,
}

impl EdgeBetas {
    /// Set all six faces to the same coefficient.
    pub fn set_all(&mut self, beta: f64) {
        *self = Self {
            width_min: beta,
            width_max: beta,
            height_min: beta,
            height_max: beta,
            depth_min: beta,
            depth_max: beta,
        };
    }

    /// Face coefficient for the axis offset at `bit` (canonical order).
    #[inline]
    fn for_axis_bit(&self, bit: usize) -> f64 {
        match bit {
            0 => self.width_min,
            1 => self.width_max,
            2 => self.height_min,
            3 => self.height_max,
            4 => self.depth_min,
            _ => self.depth_max,
        }
    }
}

/// A cuboid region in metres, used to paint geometry flags and β values.
///
/// Defaults cover the whole room, so partial bounds read like keyword
/// arguments:
///
/// ```rust
/// # use room_fdtd::compute::Region;
/// let closet = Region { d_max: 0.4, h_max: 0.8, w_min: 1.1, ..Region::default() };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub w_min: f64,
    pub w_max: f64,
    pub h_min: f64,
    pub h_max: f64,
    pub d_min: f64,
    pub d_max: f64,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            w_min: 0.0,
            w_max: f64::INFINITY,
            h_min: 0.0,
            h_max: f64::INFINITY,
            d_min: 0.0,
            d_max: f64::INFINITY,
        }
    }
}

/// The cubic simulation domain and all of its cell arrays.
pub struct SimulationGrid {
    width: usize,
    height: usize,
    depth: usize,
    dx: f64,

    geometry: Vec<u8>,
    neighbours: Vec<u32>,
    beta: Vec<f64>,
    pressure_previous: Vec<f64>,
    pressure: Vec<f64>,
    pressure_next: Vec<f64>,
    analysis: Vec<f64>,

    /// Reflection coefficients of the outer domain faces.
    pub edge_betas: EdgeBetas,

    source_set: Vec<(usize, usize, usize)>,
    built: bool,
}

impl SimulationGrid {
    /// Create an unbuilt grid for a room of `(width, height, depth)` metres,
    /// sized by the parameter set's cell size.
    pub fn new(shape: (f64, f64, f64), parameters: &SimulationParameters) -> Self {
        let dx = parameters.dx();
        let width = (shape.0 / dx).ceil().max(1.0) as usize;
        let height = (shape.1 / dx).ceil().max(1.0) as usize;
        let depth = (shape.2 / dx).ceil().max(1.0) as usize;
        let size = width * height * depth;

        Self {
            width,
            height,
            depth,
            dx,
            geometry: vec![0; size],
            neighbours: vec![0; size],
            beta: vec![0.0; size],
            pressure_previous: vec![0.0; size],
            pressure: vec![0.0; size],
            pressure_next: vec![0.0; size],
            analysis: vec![0.0; size * ANALYSIS_CHANNELS],
            edge_betas: EdgeBetas::default(),
            source_set: Vec::new(),
            built: false,
        }
    }

    /// Grid width in cells (w axis).
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells (h axis).
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Grid depth in cells (d axis).
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Cell size in metres.
    #[inline]
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Total cell count.
    #[inline]
    pub fn size(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Whether `build()` has run.
    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Convert `(w, h, d)` cell coordinates to a flat index.
    #[inline]
    pub fn index(&self, w: usize, h: usize, d: usize) -> usize {
        (d * self.height + h) * self.width + w
    }

    /// Convert a metre coordinate to a cell index along one axis.
    #[inline]
    pub fn scale(&self, metres: f64) -> usize {
        (metres / self.dx).round() as usize
    }

    /// Cell coordinates for a position in metres, clamped to the domain.
    pub fn position(&self, w: f64, h: f64, d: f64) -> (usize, usize, usize) {
        (
            self.scale(w).min(self.width - 1),
            self.scale(h).min(self.height - 1),
            self.scale(d).min(self.depth - 1),
        )
    }

    /// Geometry flags.
    #[inline]
    pub fn geometry(&self) -> &[u8] {
        &self.geometry
    }

    /// Set geometry flags at a cell (bitwise OR).
    pub fn mark_cell(&mut self, position: (usize, usize, usize), flag: u8) {
        let index = self.index(position.0, position.1, position.2);
        self.geometry[index] |= flag;
    }

    /// Neighbour masks (valid after `build()`).
    #[inline]
    pub fn neighbours(&self) -> &[u32] {
        &self.neighbours
    }

    /// Per-cell reflection coefficients.
    #[inline]
    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Pressure at the previous step.
    #[inline]
    pub fn pressure_previous(&self) -> &[f64] {
        &self.pressure_previous
    }

    /// Pressure at the current step.
    #[inline]
    pub fn pressure(&self) -> &[f64] {
        &self.pressure
    }

    /// Stacked analysis values, `ANALYSIS_CHANNELS` per cell.
    #[inline]
    pub fn analysis(&self) -> &[f64] {
        &self.analysis
    }

    /// One analysis channel value at a flat cell index.
    #[inline]
    pub fn analysis_value(&self, cell: usize, key: AnalysisKey) -> f64 {
        self.analysis[cell * ANALYSIS_CHANNELS + key as usize]
    }

    /// Positions currently flagged as source region, in build order.
    #[inline]
    pub fn source_set(&self) -> &[(usize, usize, usize)] {
        &self.source_set
    }

    /// Paint a flag (and optionally β) over all cells inside a metric region.
    pub fn fill_region(&mut self, region: Region, flag: u8, beta: Option<f64>) {
        let w0 = (region.w_min / self.dx).floor().max(0.0) as usize;
        let h0 = (region.h_min / self.dx).floor().max(0.0) as usize;
        let d0 = (region.d_min / self.dx).floor().max(0.0) as usize;
        let w1 = ((region.w_max / self.dx).ceil() as usize).min(self.width);
        let h1 = ((region.h_max / self.dx).ceil() as usize).min(self.height);
        let d1 = ((region.d_max / self.dx).ceil() as usize).min(self.depth);

        for d in d0..d1 {
            for h in h0..h1 {
                for w in w0..w1 {
                    let index = self.index(w, h, d);
                    self.geometry[index] |= flag;
                    if let Some(beta) = beta {
                        self.beta[index] = beta;
                    }
                }
            }
        }
    }

    /// Derive neighbour masks, interior β, wall analysis sentinels, and the
    /// source position index. Must run once after the scene painted geometry.
    pub fn build(&mut self) {
        populate_neighbours(
            &self.geometry,
            &mut self.neighbours,
            self.width,
            self.height,
            self.depth,
        );
        self.derive_interior_beta();
        self.poison_wall_analysis();
        self.index_source_regions();
        self.built = true;
    }

    /// Re-derive β-dependent state after a scene re-painted materials.
    ///
    /// Topology (geometry flags, neighbour masks) is untouched; only wall
    /// and edge β values may have changed.
    pub fn rebuild(&mut self) {
        self.derive_interior_beta();
        self.poison_wall_analysis();
    }

    /// Clear the `SOURCE` bit everywhere, then set it at `positions`.
    pub fn select_source_locations(&mut self, positions: &[(usize, usize, usize)]) {
        for flags in self.geometry.iter_mut() {
            *flags &= !SOURCE_FLAG;
        }
        for &(w, h, d) in positions {
            let index = self.index(w, h, d);
            self.geometry[index] |= SOURCE_FLAG;
        }
    }

    /// Zero all pressure buffers and analysis accumulators.
    pub fn reset_values(&mut self) {
        self.pressure_previous.fill(0.0);
        self.pressure.fill(0.0);
        self.pressure_next.fill(0.0);
        self.analysis.fill(0.0);
        self.poison_wall_analysis();
    }

    /// Borrow the triple buffer and the read-only cell arrays for a stencil
    /// step: `(previous, current, next, geometry, neighbours, beta)`.
    pub(crate) fn stencil_buffers(
        &mut self,
    ) -> (&[f64], &[f64], &mut [f64], &[u8], &[u32], &[f64]) {
        (
            &self.pressure_previous,
            &self.pressure,
            &mut self.pressure_next,
            &self.geometry,
            &self.neighbours,
            &self.beta,
        )
    }

    /// Borrow the current pressure and analysis arrays for an analysis step.
    pub(crate) fn analysis_buffers(&mut self) -> (&[f64], &[u8], &mut [f64]) {
        (&self.pressure, &self.geometry, &mut self.analysis)
    }

    /// Mutable views used by the GPU back-end to write readback results.
    pub(crate) fn readback_buffers(&mut self) -> (&mut [f64], &mut [f64], &mut [f64]) {
        (
            &mut self.pressure_previous,
            &mut self.pressure,
            &mut self.analysis,
        )
    }

    /// Rotate buffer roles: `(previous, current, next) <- (current, next, previous)`.
    ///
    /// A permutation of the three handles; no cell data is copied.
    pub(crate) fn rotate_buffers(&mut self) {
        std::mem::swap(&mut self.pressure_previous, &mut self.pressure);
        std::mem::swap(&mut self.pressure, &mut self.pressure_next);
    }

    /// Non-wall cells average the β of their missing axis neighbours: wall
    /// neighbours contribute the wall's material β, out-of-domain neighbours
    /// the matching face β. Cells with all six axis neighbours keep β = 0.
    fn derive_interior_beta(&mut self) {
        for d in 0..self.depth {
            for h in 0..self.height {
                for w in 0..self.width {
                    let index = self.index(w, h, d);
                    if self.geometry[index] & WALL_FLAG != 0 {
                        continue;
                    }

                    let mut sum = 0.0;
                    let mut missing = 0u32;
                    for (bit, &(dw, dh, dd)) in
                        NEIGHBOUR_OFFSETS.iter().take(AXIS_COUNT).enumerate()
                    {
                        let nw = w as i32 + dw;
                        let nh = h as i32 + dh;
                        let nd = d as i32 + dd;
                        let inside = nw >= 0
                            && nh >= 0
                            && nd >= 0
                            && nw < self.width as i32
                            && nh < self.height as i32
                            && nd < self.depth as i32;
                        if !inside {
                            sum += self.edge_betas.for_axis_bit(bit);
                            missing += 1;
                            continue;
                        }
                        let neighbour =
                            (nd as usize * self.height + nh as usize) * self.width + nw as usize;
                        if self.geometry[neighbour] & WALL_FLAG != 0 {
                            sum += self.beta[neighbour];
                            missing += 1;
                        }
                    }

                    if missing > 0 {
                        self.beta[index] = sum / missing as f64;
                    } else {
                        self.beta[index] = 0.0;
                    }
                }
            }
        }
    }

    /// Wall cells carry NaN in every analysis channel so they cannot leak
    /// into listener reductions.
    fn poison_wall_analysis(&mut self) {
        for (cell, &flags) in self.geometry.iter().enumerate() {
            if flags & WALL_FLAG != 0 {
                let base = cell * ANALYSIS_CHANNELS;
                self.analysis[base..base + ANALYSIS_CHANNELS].fill(f64::NAN);
            }
        }
    }

    fn index_source_regions(&mut self) {
        self.source_set.clear();
        for d in 0..self.depth {
            for h in 0..self.height {
                for w in 0..self.width {
                    if self.geometry[self.index(w, h, d)] & SOURCE_REGION_FLAG != 0 {
                        self.source_set.push((w, h, d));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SimulationParameters;

    fn test_grid(shape: (f64, f64, f64)) -> SimulationGrid {
        SimulationGrid::new(shape, &SimulationParameters::default())
    }

    #[test]
    fn test_shape_from_metres() {
        let parameters = SimulationParameters::default();
        let grid = test_grid((1.0, 0.5, 2.0));

        assert_eq!(grid.width(), (1.0 / parameters.dx()).ceil() as usize);
        assert_eq!(grid.height(), (0.5 / parameters.dx()).ceil() as usize);
        assert_eq!(grid.depth(), (2.0 / parameters.dx()).ceil() as usize);
        assert_eq!(grid.size(), grid.width() * grid.height() * grid.depth());
    }

    #[test]
    fn test_fill_region_paints_flags_and_beta() {
        let mut grid = test_grid((1.0, 1.0, 1.0));
        grid.fill_region(
            Region {
                w_max: 0.2,
                ..Region::default()
            },
            WALL_FLAG,
            Some(0.3),
        );

        let inside = grid.index(0, 0, 0);
        let outside = grid.index(grid.width() - 1, 0, 0);
        assert_eq!(grid.geometry()[inside] & WALL_FLAG, WALL_FLAG);
        assert_eq!(grid.beta()[inside], 0.3);
        assert_eq!(grid.geometry()[outside] & WALL_FLAG, 0);
    }

    #[test]
    fn test_build_indexes_source_regions_in_order() {
        let mut grid = test_grid((0.5, 0.5, 0.5));
        let a = grid.position(0.1, 0.1, 0.1);
        let b = grid.position(0.4, 0.4, 0.4);
        grid.mark_cell(b, SOURCE_REGION_FLAG);
        grid.mark_cell(a, SOURCE_REGION_FLAG);
        grid.build();

        // Scan order runs w fastest and d slowest, so a comes first.
        assert_eq!(grid.source_set(), &[a, b]);
    }

    #[test]
    fn test_select_source_locations_is_exclusive() {
        let mut grid = test_grid((0.5, 0.5, 0.5));
        let a = grid.position(0.1, 0.1, 0.1);
        let b = grid.position(0.4, 0.4, 0.4);
        grid.mark_cell(a, SOURCE_REGION_FLAG);
        grid.mark_cell(b, SOURCE_REGION_FLAG);
        grid.build();

        grid.select_source_locations(&[a]);
        let index_a = grid.index(a.0, a.1, a.2);
        let index_b = grid.index(b.0, b.1, b.2);
        assert_eq!(grid.geometry()[index_a] & SOURCE_FLAG, SOURCE_FLAG);
        assert_eq!(grid.geometry()[index_b] & SOURCE_FLAG, 0);

        grid.select_source_locations(&[b]);
        assert_eq!(grid.geometry()[grid.index(a.0, a.1, a.2)] & SOURCE_FLAG, 0);
        assert_eq!(grid.geometry()[index_b] & SOURCE_FLAG, SOURCE_FLAG);
    }

    #[test]
    fn test_wall_analysis_is_nan_after_build_and_reset() {
        let mut grid = test_grid((0.5, 0.5, 0.5));
        grid.fill_region(
            Region {
                w_max: 0.1,
                ..Region::default()
            },
            WALL_FLAG,
            Some(0.5),
        );
        grid.build();

        let wall = grid.index(0, 0, 0);
        for key in [
            AnalysisKey::MeanPressure,
            AnalysisKey::Rms,
            AnalysisKey::Leq,
            AnalysisKey::Ewma,
            AnalysisKey::EwmaL,
        ] {
            assert!(grid.analysis_value(wall, key).is_nan());
        }

        grid.reset_values();
        assert!(grid.analysis_value(wall, AnalysisKey::Leq).is_nan());
        let air = grid.index(grid.width() - 1, 0, 0);
        assert_eq!(grid.analysis_value(air, AnalysisKey::Leq), 0.0);
    }

    #[test]
    fn test_interior_beta_averages_walls_and_edges() {
        let mut grid = test_grid((0.5, 0.5, 0.5));
        grid.edge_betas.set_all(0.2);
        // Wall slab across w = 0 with β 0.6.
        grid.fill_region(
            Region {
                w_max: grid.dx() * 0.9,
                ..Region::default()
            },
            WALL_FLAG,
            Some(0.6),
        );
        grid.build();

        // A cell adjacent to the wall slab and the h/d minimum faces:
        // contributions 0.6 (wall) + 0.2 + 0.2 (edges) over 3 missing.
        let cell = grid.index(1, 0, 0);
        assert!((grid.beta()[cell] - (0.6 + 0.2 + 0.2) / 3.0).abs() < 1e-12);

        // A fully interior cell keeps β = 0.
        let interior = grid.index(2, 2, 2);
        assert_eq!(grid.beta()[interior], 0.0);
    }

    #[test]
    fn test_rotate_buffers_is_a_permutation() {
        let mut grid = test_grid((0.3, 0.3, 0.3));
        grid.build();
        grid.pressure_previous.fill(1.0);
        grid.pressure.fill(2.0);
        grid.pressure_next.fill(3.0);

        grid.rotate_buffers();

        assert_eq!(grid.pressure_previous[0], 2.0);
        assert_eq!(grid.pressure[0], 3.0);
        assert_eq!(grid.pressure_next[0], 1.0);

        // Three rotations restore the original assignment.
        grid.rotate_buffers();
        grid.rotate_buffers();
        assert_eq!(grid.pressure_previous[0], 1.0);
        assert_eq!(grid.pressure[0], 2.0);
        assert_eq!(grid.pressure_next[0], 3.0);
    }

    #[test]
    fn test_buffer_handles_never_alias() {
        let mut grid = test_grid((0.3, 0.3, 0.3));
        grid.build();

        for _ in 0..3 {
            let previous = grid.pressure_previous.as_ptr();
            let current = grid.pressure.as_ptr();
            let next = grid.pressure_next.as_ptr();
            assert_ne!(previous, current);
            assert_ne!(current, next);
            assert_ne!(previous, next);
            grid.rotate_buffers();
        }
    }
}

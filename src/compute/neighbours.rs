//! Canonical 26-neighbour offset table and mask derivation.
//!
//! Bit `i` of a cell's mask corresponds to `NEIGHBOUR_OFFSETS[i]` and is set
//! iff that neighbour is inside the grid and not a wall. The ordering is
//! fixed: 6 axis offsets, then 12 edge offsets, then 8 corner offsets. The
//! stencil kernel and all tests rely on this ordering.

use super::grid::WALL_FLAG;

/// Offsets `(dw, dh, dd)` in canonical order: axis, edge, corner.
pub const NEIGHBOUR_OFFSETS: [(i32, i32, i32); 26] = [
    // 6 axis neighbours
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
    // 12 edge neighbours
    (-1, -1, 0),
    (-1, 1, 0),
    (1, -1, 0),
    (1, 1, 0),
    (-1, 0, -1),
    (-1, 0, 1),
    (1, 0, -1),
    (1, 0, 1),
    (0, -1, -1),
    (0, -1, 1),
    (0, 1, -1),
    (0, 1, 1),
    // 8 corner neighbours
    (-1, -1, -1),
    (-1, -1, 1),
    (-1, 1, -1),
    (-1, 1, 1),
    (1, -1, -1),
    (1, -1, 1),
    (1, 1, -1),
    (1, 1, 1),
];

/// Number of axis offsets at the front of [`NEIGHBOUR_OFFSETS`].
pub const AXIS_COUNT: usize = 6;

/// Number of edge offsets following the axis group.
pub const EDGE_COUNT: usize = 12;

/// Number of corner offsets at the tail.
pub const CORNER_COUNT: usize = 8;

/// Mask selecting the 6 axis bits.
pub const AXIS_BITS: u32 = (1 << AXIS_COUNT) - 1;

/// Mask selecting the 12 edge bits.
pub const EDGE_BITS: u32 = ((1 << EDGE_COUNT) - 1) << AXIS_COUNT;

/// Mask selecting the 8 corner bits.
pub const CORNER_BITS: u32 = ((1 << CORNER_COUNT) - 1) << (AXIS_COUNT + EDGE_COUNT);

/// Flat-index strides for each canonical offset on a `(width, height, depth)`
/// grid with `idx = (d * height + h) * width + w`.
pub fn offset_strides(width: usize, height: usize) -> [isize; 26] {
    let mut strides = [0isize; 26];
    for (stride, &(dw, dh, dd)) in strides.iter_mut().zip(NEIGHBOUR_OFFSETS.iter()) {
        *stride = dd as isize * (height * width) as isize + dh as isize * width as isize + dw as isize;
    }
    strides
}

/// Compute the neighbour mask of every cell from the geometry flags.
///
/// A pure function of `geometry`; called once at grid build time.
pub fn populate_neighbours(
    geometry: &[u8],
    neighbours: &mut [u32],
    width: usize,
    height: usize,
    depth: usize,
) {
    for d in 0..depth {
        for h in 0..height {
            for w in 0..width {
                let index = (d * height + h) * width + w;
                let mut mask = 0u32;
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
                    let neighbour = (nd as usize * height + nh as usize) * width + nw as usize;
                    if geometry[neighbour] & WALL_FLAG == 0 {
                        mask |= 1 << bit;
                    }
                }
                neighbours[index] = mask;
            }
        }
    }
}

//! Scene module - Room descriptions that paint geometry and materials into
//! a grid.
//!
//! A scene knows its room dimensions and how to mark walls, source regions,
//! and listeners. The numerical core never depends on a specific scene;
//! everything flows through the `Scene` trait and the grid's region API.

mod materials;
mod reference;

pub use materials::*;
pub use reference::*;

use serde::Serialize;

use crate::compute::SimulationGrid;
use crate::schema::{C_AIR, SimulationParameters};

/// An analytic room mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoomMode {
    /// Modal frequency in Hz.
    pub frequency: f64,
    /// Count of non-zero mode indices: 1 axial, 2 tangential, 3 oblique.
    pub axis_kind: u8,
}

/// A room description the sweep driver can (re)build grids from.
pub trait Scene {
    /// Room dimensions in metres `(width, height, depth)`.
    fn dimensions(&self) -> (f64, f64, f64);

    /// Paint geometry flags and β values into the grid.
    ///
    /// Called at build time and again on every rebuild, so it must be
    /// idempotent with respect to topology; only β values may depend on
    /// the current signal frequency.
    fn mark_regions(&self, grid: &mut SimulationGrid, parameters: &SimulationParameters);

    /// Instantiate and build a grid for this scene.
    fn build(&self, parameters: &SimulationParameters) -> SimulationGrid {
        let mut grid = SimulationGrid::new(self.dimensions(), parameters);
        self.mark_regions(&mut grid, parameters);
        grid.build();
        grid
    }

    /// Re-paint β values (for frequency-dependent materials) without
    /// re-topologising geometry or neighbour masks.
    fn rebuild(&self, grid: &mut SimulationGrid, parameters: &SimulationParameters) {
        self.mark_regions(grid, parameters);
        grid.rebuild();
    }

    /// Analytic modal frequencies for mode indices 0..4 per axis,
    /// excluding the trivial (0,0,0) mode.
    fn room_modes(&self) -> Vec<RoomMode> {
        let (width, height, depth) = self.dimensions();
        let mut modes = Vec::new();
        for i in 0..4u8 {
            for j in 0..4u8 {
                for k in 0..4u8 {
                    let axis_kind =
                        (i > 0) as u8 + (j > 0) as u8 + (k > 0) as u8;
                    if axis_kind == 0 {
                        continue;
                    }
                    let nw = i as f64 / width;
                    let nh = j as f64 / height;
                    let nd = k as f64 / depth;
                    let frequency = (C_AIR / 2.0) * (nw * nw + nh * nh + nd * nd).sqrt();
                    modes.push(RoomMode {
                        frequency,
                        axis_kind,
                    });
                }
            }
        }
        modes
    }
}

/// Look up a scene by CLI name.
pub fn scene_by_name(name: &str) -> Option<Box<dyn Scene>> {
    match name {
        "shoebox" => Some(Box::new(ShoeboxReferenceScene::new())),
        "cuboid" => Some(Box::new(CuboidReferenceScene::new())),
        "listening" => Some(Box::new(ListeningRoomScene::new())),
        _ => None,
    }
}

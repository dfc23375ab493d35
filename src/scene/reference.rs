//! Reference scenes for validation runs and subwoofer placement sweeps.

use crate::compute::{LISTENER_FLAG, Region, SOURCE_REGION_FLAG, SimulationGrid, WALL_FLAG};
use crate::schema::SimulationParameters;

use super::{Scene, SimulatedMaterial};

/// Empty shoebox room with lightly absorbing faces, one candidate source
/// position near a corner and one listener cell.
#[derive(Debug, Default)]
pub struct ShoeboxReferenceScene;

impl ShoeboxReferenceScene {
    pub fn new() -> Self {
        Self
    }
}

impl Scene for ShoeboxReferenceScene {
    fn dimensions(&self) -> (f64, f64, f64) {
        (5.5, 2.8, 4.0)
    }

    fn mark_regions(&self, grid: &mut SimulationGrid, _parameters: &SimulationParameters) {
        grid.edge_betas.set_all(0.1);
        // Carpeted floor.
        grid.edge_betas.height_min = 0.05;

        let source = grid.position(0.3, 0.3, 0.3);
        grid.mark_cell(source, SOURCE_REGION_FLAG);

        let listener = grid.position(1.33, 1.0, 1.38);
        grid.mark_cell(listener, LISTENER_FLAG);
    }
}

/// Seven-metre cube, useful as a symmetric reference.
#[derive(Debug, Default)]
pub struct CuboidReferenceScene;

impl CuboidReferenceScene {
    pub fn new() -> Self {
        Self
    }
}

impl Scene for CuboidReferenceScene {
    fn dimensions(&self) -> (f64, f64, f64) {
        (7.0, 7.0, 7.0)
    }

    fn mark_regions(&self, grid: &mut SimulationGrid, _parameters: &SimulationParameters) {
        grid.edge_betas.set_all(0.1);

        let source = grid.position(0.3, 0.15, 0.15);
        grid.mark_cell(source, SOURCE_REGION_FLAG);

        let listener = grid.position(1.33, 1.0, 1.38);
        grid.mark_cell(listener, LISTENER_FLAG);
    }
}

/// A furnished listening room with frequency-dependent wall materials, a
/// closet, a listening couch, and a band of candidate subwoofer positions
/// along the front wall.
#[derive(Debug, Default)]
pub struct ListeningRoomScene;

impl ListeningRoomScene {
    pub fn new() -> Self {
        Self
    }
}

impl Scene for ListeningRoomScene {
    fn dimensions(&self) -> (f64, f64, f64) {
        (3.6, 2.6, 4.2)
    }

    fn mark_regions(&self, grid: &mut SimulationGrid, parameters: &SimulationParameters) {
        let frequency = parameters.signal_frequency();
        let plaster = SimulatedMaterial::from_name("plaster").beta(frequency);
        let concrete = SimulatedMaterial::from_name("painted_concrete").beta(frequency);
        let carpet = SimulatedMaterial::from_name("carpet").beta(frequency);
        let wood = SimulatedMaterial::from_name("wood").beta(frequency);

        grid.edge_betas.set_all(plaster);
        grid.edge_betas.height_min = carpet;
        grid.edge_betas.height_max = concrete;

        // Wooden closet along the right wall.
        grid.fill_region(
            Region {
                w_min: 3.0,
                d_min: 0.9,
                d_max: 1.9,
                h_max: 2.0,
                ..Region::default()
            },
            WALL_FLAG,
            Some(wood),
        );

        // Couch near the back wall doubles as the listening area.
        grid.fill_region(
            Region {
                d_min: 3.4,
                d_max: 4.0,
                h_min: 0.8,
                h_max: 1.2,
                w_min: 1.0,
                w_max: 2.6,
                ..Region::default()
            },
            LISTENER_FLAG,
            None,
        );

        // Candidate subwoofer positions hug the front wall at floor level.
        grid.fill_region(
            Region {
                d_max: 0.4,
                h_max: 0.4,
                w_min: 0.3,
                w_max: 3.3,
                ..Region::default()
            },
            SOURCE_REGION_FLAG,
            None,
        );
    }
}

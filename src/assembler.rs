use serde::Serialize;

use crate::cost_matrix::CostMatrix;
use crate::error::{Error, Result};
use crate::grid::{Grid, Point};
use crate::pathfinding::{Path, Pathfinder};
use crate::tour::{tour_legs, StopId, TourPolicy};

/// Path between two consecutive stops of a tour.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Leg {
    pub from: StopId,
    pub to: StopId,
    pub path: Path,
}

impl Leg {
    /// Cell centers along the leg, in meters.
    pub fn waypoints(&self, grid: &Grid) -> Vec<Point> {
        self.path.steps.iter().map(|&cell| grid.cell_center(cell)).collect()
    }
}

/// One leg per pair of consecutive stops in agent -> order[0] -> order[1] ...
/// Legs come from the matrix's path cache when it has them, otherwise they
/// are searched again on `grid`.
pub fn assemble(order: &[StopId], matrix: &CostMatrix, grid: &Grid,
                policy: TourPolicy) -> Result<Vec<Leg>> {
    let legs = tour_legs(order, policy);
    let mut pathfinder: Option<Pathfinder> = None;
    let mut out = Vec::with_capacity(legs.len());
    for (from, to) in legs {
        let path = match matrix.path(from, to) {
            Some(path) => path,
            None => {
                let stops = matrix.stops();
                if from >= stops.len() || to >= stops.len() {
                    return Err(Error::InvalidCostMatrix(
                        format!("no cell known for stops {from}->{to}")));
                }
                pathfinder.get_or_insert_with(
                    || Pathfinder::new(grid, matrix.connectivity()))
                    .shortest_path(stops[from], stops[to])?
            }
        };
        out.push(Leg { from, to, path });
    }
    Ok(out)
}

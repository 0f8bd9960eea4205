// One planning session: distances between all stops, a visiting order, then
// the concrete route.
use log::info;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::assembler::{assemble, Leg};
use crate::cost_matrix::{BuildOptions, CostMatrix};
use crate::error::Result;
use crate::grid::{Cell, Grid, Point};
use crate::solvers::Solver;
use crate::tour::StopId;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Plan {
    /// Stop ids in visiting order. Target `i` of the input is stop `i + 1`.
    pub order: Vec<StopId>,
    pub cost: f64,
    pub legs: Vec<Leg>,
    /// Cell of each stop, agent first.
    pub stops: Vec<Cell>,
}

impl Plan {
    /// Visiting order as indices into the input targets.
    pub fn target_order(&self) -> Vec<usize> {
        self.order.iter().map(|&stop| stop - 1).collect()
    }
}

pub fn plan(grid: &Arc<Grid>, agent: Point, targets: &[Point],
            solver: &mut dyn Solver, options: &BuildOptions) -> Result<Plan> {
    let plan_start = Instant::now();
    info!("Planning a tour of {} targets on a {}x{} grid ({} blocked cells)",
          targets.len(), grid.width(), grid.height(), grid.blocked_count());

    let matrix_start = Instant::now();
    let matrix = CostMatrix::build(grid, agent, targets, options)?;
    info!("Cost matrix was built in {:?}", matrix_start.elapsed());

    let tour = solver.solve(&matrix)?;
    let legs = assemble(&tour.order, &matrix, grid, solver.policy())?;
    info!("Plan done in {:?}: order {:?}, cost {}", plan_start.elapsed(),
          tour.order, tour.cost);
    Ok(Plan {
        order: tour.order,
        cost: tour.cost,
        legs,
        stops: matrix.stops().to_vec(),
    })
}

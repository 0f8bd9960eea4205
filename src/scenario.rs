// Serializable description of a planning problem, as produced by a world
// generator or saved to disk.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::{Grid, Point};

fn default_obstacle_threshold() -> u8 { 255 }

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct WorldDescription {
    pub width_m: f64,
    pub height_m: f64,
    /// Cells per meter.
    pub resolution: f64,
    /// Row-major cell values, `cells[row * width + col]`.
    pub cells: Vec<u8>,
    /// Values >= this are obstacles.
    #[serde(default = "default_obstacle_threshold")]
    pub obstacle_threshold: u8,
}

impl WorldDescription {
    /// (width, height) in cells.
    pub fn dimensions(&self) -> Result<(usize, usize)> {
        let cells = |meters: f64| -> Result<usize> {
            let count = (meters * self.resolution).round();
            if count.is_finite() && count >= 1.0 {
                Ok(count as usize)
            } else {
                Err(Error::InvalidWorld(
                    format!("{meters}m at {} cells/m gives no cells",
                            self.resolution)))
            }
        };
        Ok((cells(self.width_m)?, cells(self.height_m)?))
    }

    pub fn to_grid(&self) -> Result<Grid> {
        let (width, height) = self.dimensions()?;
        Grid::new(width, height, self.resolution, &self.cells,
                  self.obstacle_threshold)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Scenario {
    pub world: WorldDescription,
    pub agent: Point,
    pub targets: Vec<Point>,
}

impl Scenario {
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

// Immutable occupancy grid that every distance query runs on.
use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Ord, PartialOrd, Copy, Clone)]
pub struct Cell {
    pub row: u16,
    pub col: u16,
}

impl Cell {
    pub fn new(row: u16, col: u16) -> Self {
        Cell { row, col }
    }
}

/// Continuous coordinate in meters.
#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Copy, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Orthogonal moves only.
    #[default]
    Four,
    /// Orthogonal and diagonal moves.
    Eight,
}

pub type Neighbors = ArrayVec<Cell, 8>;

const ORTHOGONAL_DELTAS: [(i32, i32); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
const ALL_DELTAS: [(i32, i32); 8] = [(-1, -1), (-1, 0), (-1, 1), (0, -1),
                                     (0, 1), (1, -1), (1, 0), (1, 1)];

// Dimensions must fit in a Cell so that width * height can't overflow.
fn check_dimensions(width: usize, height: usize, resolution: f64) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidWorld(
            format!("empty grid ({width}x{height})")));
    }
    if width > u16::MAX as usize || height > u16::MAX as usize {
        return Err(Error::InvalidWorld(
            format!("grid too large ({width}x{height})")));
    }
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(Error::InvalidWorld(
            format!("resolution must be positive, got {resolution}")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: u16,
    height: u16,
    // Cells per meter.
    resolution: f64,
    // blocked[row * width + col]
    blocked: Vec<bool>,
}

impl Grid {
    /// Builds a grid from raw row-major cell values. A cell is blocked when
    /// its value is >= `obstacle_threshold`.
    pub fn new(width: usize, height: usize, resolution: f64, values: &[u8],
               obstacle_threshold: u8) -> Result<Self> {
        let blocked = values.iter().map(|&v| v >= obstacle_threshold).collect();
        Grid::from_blocked(width, height, resolution, blocked)
    }

    pub fn from_blocked(width: usize, height: usize, resolution: f64,
                        blocked: Vec<bool>) -> Result<Self> {
        check_dimensions(width, height, resolution)?;
        if blocked.len() != width * height {
            return Err(Error::InvalidWorld(
                format!("expected {} cells for a {width}x{height} grid, got {}",
                        width * height, blocked.len())));
        }
        Ok(Grid {
            width: width as u16,
            height: height as u16,
            resolution,
            blocked,
        })
    }

    /// Grid with no obstacles at all.
    pub fn free(width: usize, height: usize, resolution: f64) -> Result<Self> {
        check_dimensions(width, height, resolution)?;
        Grid::from_blocked(width, height, resolution, vec![false; width * height])
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Size of a cell side, in meters.
    pub fn cell_size(&self) -> f64 {
        1.0 / self.resolution
    }

    #[inline]
    pub fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && col >= 0
            && row < self.height as i32 && col < self.width as i32
    }

    #[inline]
    fn index(&self, cell: Cell) -> usize {
        cell.row as usize * self.width as usize + cell.col as usize
    }

    /// Out of range cells count as blocked.
    #[inline]
    pub fn is_blocked(&self, cell: Cell) -> bool {
        if cell.row >= self.height || cell.col >= self.width {
            return true;
        }
        self.blocked[self.index(cell)]
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|&&b| b).count()
    }

    pub fn to_cell(&self, point: Point) -> Result<Cell> {
        let col = (point.x * self.resolution).floor();
        let row = (point.y * self.resolution).floor();
        // NaN fails every comparison and lands here too.
        if !(col >= 0.0 && row >= 0.0
             && col < self.width as f64 && row < self.height as f64) {
            return Err(Error::OutOfBounds { x: point.x, y: point.y });
        }
        Ok(Cell { row: row as u16, col: col as u16 })
    }

    pub fn cell_center(&self, cell: Cell) -> Point {
        let size = self.cell_size();
        Point {
            x: (cell.col as f64 + 0.5) * size,
            y: (cell.row as f64 + 0.5) * size,
        }
    }

    pub fn neighbors(&self, cell: Cell, connectivity: Connectivity) -> Neighbors {
        let deltas: &[(i32, i32)] = match connectivity {
            Connectivity::Four => &ORTHOGONAL_DELTAS,
            Connectivity::Eight => &ALL_DELTAS,
        };
        deltas.iter().filter_map(|&(dr, dc)| {
            let row = cell.row as i32 + dr;
            let col = cell.col as i32 + dc;
            if !self.in_bounds(row, col) {
                return None;
            }
            let neighbor = Cell { row: row as u16, col: col as u16 };
            if self.is_blocked(neighbor) {
                None
            } else {
                Some(neighbor)
            }
        }).collect()
    }
}

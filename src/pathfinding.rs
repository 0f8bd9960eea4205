use priority_queue::PriorityQueue;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::cmp::Reverse;

use crate::error::{Error, Result};
use crate::grid::{Cell, Connectivity, Grid};

// Costs are accumulated as fixed-point integers so that a path and its
// reverse always sum to the exact same value.
type FixedCost = u64;
const STRAIGHT_COST: FixedCost = 1_000_000_000;
const DIAGONAL_COST: FixedCost = 1_414_213_562;  // sqrt(2) * STRAIGHT_COST
const COST_SCALE: f64 = STRAIGHT_COST as f64;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Path {
    pub steps: Vec<Cell>,
    /// In cell steps. Infinite when the goal can't be reached.
    pub cost: f64,
}

impl Path {
    pub fn unreachable() -> Self {
        Path { steps: Vec::new(), cost: f64::INFINITY }
    }

    pub fn is_reachable(&self) -> bool {
        self.cost.is_finite()
    }

    pub fn reversed(&self) -> Path {
        let mut steps = self.steps.clone();
        steps.reverse();
        Path { steps, cost: self.cost }
    }

    pub fn start(&self) -> Option<Cell> {
        self.steps.first().copied()
    }

    pub fn goal(&self) -> Option<Cell> {
        self.steps.last().copied()
    }
}

fn step_cost(from: Cell, to: Cell) -> FixedCost {
    if from.row != to.row && from.col != to.col {
        DIAGONAL_COST
    } else {
        STRAIGHT_COST
    }
}

// Manhattan for 4-connectivity, octile for 8-connectivity. Both are exact on
// a free grid, so admissible and consistent.
fn heuristic(from: Cell, goal: Cell, connectivity: Connectivity) -> FixedCost {
    let dr = (from.row as i32 - goal.row as i32).unsigned_abs() as FixedCost;
    let dc = (from.col as i32 - goal.col as i32).unsigned_abs() as FixedCost;
    match connectivity {
        Connectivity::Four => (dr + dc) * STRAIGHT_COST,
        Connectivity::Eight => {
            let (low, high) = if dr < dc { (dr, dc) } else { (dc, dr) };
            low * DIAGONAL_COST + (high - low) * STRAIGHT_COST
        }
    }
}

type CameFrom = FxHashMap<Cell, Cell>;
type CostSoFar = FxHashMap<Cell, FixedCost>;
// f-score first, then insertion order so equal f-scores pop FIFO.
type Priority = Reverse<(FixedCost, u64)>;

/// A* search over a grid. Keeps its scratch maps around so repeated queries
/// don't reallocate; nothing carries over between queries.
pub struct Pathfinder<'a> {
    grid: &'a Grid,
    connectivity: Connectivity,

    came_from: CameFrom,
    cost_so_far: CostSoFar,
}

impl<'a> Pathfinder<'a> {
    pub fn new(grid: &'a Grid, connectivity: Connectivity) -> Self {
        Pathfinder {
            grid,
            connectivity,
            came_from: CameFrom::default(),
            cost_so_far: CostSoFar::default(),
        }
    }

    pub fn grid(&self) -> &Grid {
        self.grid
    }

    fn reconstruct_path(&self, start: Cell, goal: Cell) -> Path {
        let cost = match self.cost_so_far.get(&goal) {
            Some(&cost) => cost,
            None => return Path::unreachable(),
        };
        let mut steps = Vec::new();
        let mut current = goal;
        while current != start {
            steps.push(current);
            current = match self.came_from.get(&current) {
                Some(&previous) => previous,
                None => return Path::unreachable(),
            };
        }
        steps.push(start);
        steps.reverse();
        Path { steps, cost: cost as f64 / COST_SCALE }
    }

    fn a_star_search(&mut self, start: Cell, goal: Cell) -> bool {
        self.cost_so_far.clear();
        self.came_from.clear();

        let mut frontier: PriorityQueue<Cell, Priority> = PriorityQueue::new();
        let mut sequence: u64 = 0;
        frontier.push(start, Reverse((heuristic(start, goal, self.connectivity),
                                      sequence)));
        self.came_from.insert(start, start);
        self.cost_so_far.insert(start, 0);

        while let Some((current, _)) = frontier.pop() {
            if current == goal {
                return true;
            }
            let cost = match self.cost_so_far.get(&current) {
                Some(&cost) => cost,
                None => continue,
            };
            for next in self.grid.neighbors(current, self.connectivity) {
                let new_cost = cost + step_cost(current, next);
                let improves = match self.cost_so_far.get(&next) {
                    Some(&old_cost) => new_cost < old_cost,
                    None => true,
                };
                if improves {
                    self.cost_so_far.insert(next, new_cost);
                    self.came_from.insert(next, current);
                    let f = new_cost + heuristic(next, goal, self.connectivity);
                    sequence += 1;
                    frontier.push(next, Reverse((f, sequence)));
                }
            }
        }
        false
    }

    /// Minimum cost path from `start` to `goal`. An unreachable goal is not an
    /// error: it gives an empty path with an infinite cost.
    pub fn shortest_path(&mut self, start: Cell, goal: Cell) -> Result<Path> {
        for endpoint in [start, goal] {
            if self.grid.is_blocked(endpoint) {
                return Err(Error::InvalidEndpoint { cell: endpoint });
            }
        }
        if start == goal {
            return Ok(Path { steps: vec![start], cost: 0.0 });
        }
        if self.a_star_search(start, goal) {
            Ok(self.reconstruct_path(start, goal))
        } else {
            Ok(Path::unreachable())
        }
    }

    pub fn distance(&mut self, start: Cell, goal: Cell) -> Result<f64> {
        self.shortest_path(start, goal).map(|path| path.cost)
    }

    /// Checks that consecutive steps are free neighbors and that the cost
    /// matches the moves taken.
    pub fn verify_path(&self, path: &Path) -> bool {
        if !path.is_reachable() {
            return path.steps.is_empty();
        }
        let mut cost: FixedCost = 0;
        for pair in path.steps.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if !self.grid.neighbors(from, self.connectivity).contains(&to) {
                return false;
            }
            cost += step_cost(from, to);
        }
        !path.steps.is_empty()
            && path.steps.iter().all(|&cell| !self.grid.is_blocked(cell))
            && cost as f64 / COST_SCALE == path.cost
    }
}

pub fn find_path(grid: &Grid, start: Cell, goal: Cell,
                 connectivity: Connectivity) -> Result<Path> {
    Pathfinder::new(grid, connectivity).shortest_path(start, goal)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand::rngs::SmallRng;
    use super::*;

    const SQRT_2: f64 = std::f64::consts::SQRT_2;

    fn random_grid(width: usize, height: usize, density: f64, seed: u64) -> Grid {
        let mut rng = SmallRng::seed_from_u64(seed);
        let blocked = (0..width * height).map(|_| rng.gen::<f64>() < density)
            .collect();
        Grid::from_blocked(width, height, 1.0, blocked).unwrap()
    }

    fn free_cells(grid: &Grid) -> Vec<Cell> {
        let mut cells = Vec::new();
        for row in 0..grid.height() {
            for col in 0..grid.width() {
                let cell = Cell::new(row as u16, col as u16);
                if !grid.is_blocked(cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    #[test]
    fn test_free_grid_four_connected_is_manhattan() {
        let grid = Grid::free(10, 10, 1.0).unwrap();
        let mut pathfinder = Pathfinder::new(&grid, Connectivity::Four);
        let path = pathfinder.shortest_path(Cell::new(0, 0), Cell::new(3, 5))
            .unwrap();
        assert_eq!(path.cost, 8.0);
        assert_eq!(path.steps.len(), 9);
        assert_eq!(path.start(), Some(Cell::new(0, 0)));
        assert_eq!(path.goal(), Some(Cell::new(3, 5)));
        assert!(pathfinder.verify_path(&path));
    }

    #[test]
    fn test_free_grid_eight_connected_is_octile() {
        let grid = Grid::free(10, 10, 1.0).unwrap();
        let mut pathfinder = Pathfinder::new(&grid, Connectivity::Eight);
        let path = pathfinder.shortest_path(Cell::new(0, 0), Cell::new(3, 5))
            .unwrap();
        let expected = 3.0 * SQRT_2 + 2.0;
        assert!((path.cost - expected).abs() / expected < 1e-9,
                "got {}, expected {}", path.cost, expected);
        assert_eq!(path.steps.len(), 6);
        assert!(pathfinder.verify_path(&path));
    }

    #[test]
    fn test_long_diagonal_keeps_sqrt2_weight() {
        let grid = Grid::free(200, 200, 1.0).unwrap();
        let path = find_path(&grid, Cell::new(0, 0), Cell::new(199, 199),
                             Connectivity::Eight).unwrap();
        let expected = 199.0 * SQRT_2;
        assert!((path.cost - expected).abs() / expected < 1e-9,
                "got {}, expected {}", path.cost, expected);
        assert_eq!(path.steps.len(), 200);
    }

    #[test]
    fn test_fixed_point_orders_like_sqrt2() {
        // A run of diagonals against the straight runs closest to it in
        // cost, e.g. 985 diagonals vs 1393 straight steps (0.0004 apart).
        for diagonals in 1..=2000u64 {
            let exact = diagonals as f64 * SQRT_2;
            for straights in [exact.floor() as u64, exact.ceil() as u64] {
                let fixed = (diagonals * DIAGONAL_COST).cmp(&(straights * STRAIGHT_COST));
                assert_eq!(Some(fixed), exact.partial_cmp(&(straights as f64)),
                           "{diagonals} diagonals vs {straights} straight steps");
            }
        }
    }

    #[test]
    fn test_same_cell() {
        let grid = Grid::free(4, 4, 1.0).unwrap();
        let path = find_path(&grid, Cell::new(2, 2), Cell::new(2, 2),
                             Connectivity::Four).unwrap();
        assert_eq!(path.steps, vec![Cell::new(2, 2)]);
        assert_eq!(path.cost, 0.0);
    }

    #[test]
    fn test_blocked_endpoint() {
        let grid = Grid::new(3, 1, 1.0, &[0, 0, 255], 255).unwrap();
        assert_eq!(find_path(&grid, Cell::new(0, 0), Cell::new(0, 2),
                             Connectivity::Four),
                   Err(Error::InvalidEndpoint { cell: Cell::new(0, 2) }));
        assert_eq!(find_path(&grid, Cell::new(0, 2), Cell::new(0, 0),
                             Connectivity::Eight),
                   Err(Error::InvalidEndpoint { cell: Cell::new(0, 2) }));
    }

    #[test]
    fn test_enclosed_goal_is_unreachable() {
        // Goal in the middle of a 5x5 grid, surrounded by a ring of walls.
        let mut values = vec![0u8; 25];
        for (row, col) in [(1, 1), (1, 2), (1, 3), (2, 1), (2, 3),
                           (3, 1), (3, 2), (3, 3)] {
            values[row * 5 + col] = 255;
        }
        let grid = Grid::new(5, 5, 1.0, &values, 255).unwrap();
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let path = find_path(&grid, Cell::new(0, 0), Cell::new(2, 2),
                                 connectivity).unwrap();
            assert!(!path.is_reachable());
            assert!(path.steps.is_empty());
            assert_eq!(path.cost, f64::INFINITY);
        }
    }

    #[test]
    fn test_detour_around_wall() {
        // Wall on column 2 with a gap at the bottom row.
        let mut values = vec![0u8; 25];
        for row in 0..4 {
            values[row * 5 + 2] = 255;
        }
        let grid = Grid::new(5, 5, 1.0, &values, 255).unwrap();
        let mut pathfinder = Pathfinder::new(&grid, Connectivity::Four);
        let path = pathfinder.shortest_path(Cell::new(0, 0), Cell::new(0, 4))
            .unwrap();
        // Down 4, right 4, up 4.
        assert_eq!(path.cost, 12.0);
        assert!(path.steps.contains(&Cell::new(4, 2)));
        assert!(pathfinder.verify_path(&path));
    }

    #[test]
    fn test_diagonal_through_corner() {
        // Diagonal moves only need both cells to be free.
        let grid = Grid::new(2, 2, 1.0, &[0, 255, 255, 0], 255).unwrap();
        let eight = find_path(&grid, Cell::new(0, 0), Cell::new(1, 1),
                              Connectivity::Eight).unwrap();
        assert_eq!(eight.steps, vec![Cell::new(0, 0), Cell::new(1, 1)]);
        let four = find_path(&grid, Cell::new(0, 0), Cell::new(1, 1),
                             Connectivity::Four).unwrap();
        assert!(!four.is_reachable());
    }

    #[test]
    fn test_symmetric_costs() {
        for seed in 0..5 {
            let grid = random_grid(12, 9, 0.3, seed);
            let cells = free_cells(&grid);
            for connectivity in [Connectivity::Four, Connectivity::Eight] {
                let mut pathfinder = Pathfinder::new(&grid, connectivity);
                for a in cells.iter().step_by(7) {
                    for b in cells.iter().step_by(5) {
                        let forward = pathfinder.shortest_path(*a, *b).unwrap();
                        let backward = pathfinder.shortest_path(*b, *a).unwrap();
                        assert_eq!(forward.cost, backward.cost,
                                   "{:?} <-> {:?}, seed {}", a, b, seed);
                        assert!(pathfinder.verify_path(&forward));
                        assert!(pathfinder.verify_path(&backward));
                    }
                }
            }
        }
    }

    #[test]
    fn test_deterministic_paths() {
        let grid = random_grid(15, 15, 0.2, 7);
        let cells = free_cells(&grid);
        let (start, goal) = (cells[0], cells[cells.len() - 1]);
        let first = find_path(&grid, start, goal, Connectivity::Eight).unwrap();
        let second = find_path(&grid, start, goal, Connectivity::Eight).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reversed() {
        let grid = Grid::free(3, 3, 1.0).unwrap();
        let path = find_path(&grid, Cell::new(0, 0), Cell::new(0, 2),
                             Connectivity::Four).unwrap();
        let reversed = path.reversed();
        assert_eq!(reversed.start(), Some(Cell::new(0, 2)));
        assert_eq!(reversed.goal(), Some(Cell::new(0, 0)));
        assert_eq!(reversed.cost, path.cost);
    }
}

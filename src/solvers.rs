// Different solver implementations to pick the order in which to visit targets.

use itertools::Itertools;
use log::{info, warn};
use std::time::Instant;

use crate::cost_matrix::CostMatrix;
use crate::error::{Error, Result};
use crate::genetic::{self, HyperParams};
use crate::tour::{StopId, Tour, TourPolicy, AGENT};

/// Past this, enumerating all orders takes too long to be useful.
pub const MAX_EXHAUSTIVE_TARGETS: usize = 9;

pub trait Solver {
    // Name to display for this solver.
    fn name(&self) -> &str;

    // Whether the tours it finds return to the agent's start.
    fn policy(&self) -> TourPolicy;

    // Implementation of the solver.
    fn do_solve(&mut self, matrix: &CostMatrix) -> Result<Tour>;

    // Wrapper to do_solve, to log timing and cost information.
    fn solve(&mut self, matrix: &CostMatrix) -> Result<Tour> {
        let start = Instant::now();
        let tour = self.do_solve(matrix);
        info!("Solver {} took {:?}", self.name(), start.elapsed());
        match &tour {
            Ok(tour) => info!(
                "Solver {} found a tour of cost {}, visiting {} targets",
                self.name(), tour.cost, tour.order.len()),
            Err(err) => warn!("Solver {} did NOT find a tour: {}", self.name(), err),
        };
        tour
    }
}

// Evolves visiting orders with a genetic algorithm. See genetic.rs.
pub struct GeneticSolver {
    pub hyperparams: HyperParams,
    pub policy: TourPolicy,
}

// Greedy: always goes to the cheapest target not visited yet.
pub struct NearestNeighborSolver {
    pub policy: TourPolicy,
}

// Tries every possible order. Exact, but only usable on a handful of targets.
pub struct ExhaustiveSolver {
    pub policy: TourPolicy,
}

impl GeneticSolver {
    pub fn new(hyperparams: HyperParams, policy: TourPolicy) -> Self {
        GeneticSolver { hyperparams, policy }
    }
}

impl Default for GeneticSolver {
    fn default() -> Self {
        GeneticSolver::new(HyperParams::default(), TourPolicy::Open)
    }
}

impl Solver for GeneticSolver {
    fn name(&self) -> &str {
        "genetic"
    }

    fn policy(&self) -> TourPolicy {
        self.policy
    }

    fn do_solve(&mut self, matrix: &CostMatrix) -> Result<Tour> {
        genetic::solve(matrix, &self.hyperparams, self.policy)
    }
}

impl Solver for NearestNeighborSolver {
    fn name(&self) -> &str {
        "nearest-neighbor"
    }

    fn policy(&self) -> TourPolicy {
        self.policy
    }

    fn do_solve(&mut self, matrix: &CostMatrix) -> Result<Tour> {
        let mut unvisited: Vec<StopId> = (1..=matrix.num_targets()).collect();
        let mut order = Vec::with_capacity(unvisited.len());
        let mut current = AGENT;
        while !unvisited.is_empty() {
            // Ties go to the lowest id, 'unvisited' stays sorted.
            let (idx, _) = unvisited.iter().enumerate()
                .min_by(|&(_, &a), &(_, &b)| matrix.cost(current, a)
                        .total_cmp(&matrix.cost(current, b)))
                .ok_or(Error::NoFeasibleTour)?;
            current = unvisited.remove(idx);
            order.push(current);
        }
        let cost = matrix.tour_cost(&order, self.policy);
        if cost.is_finite() {
            Ok(Tour { order, cost })
        } else {
            Err(Error::NoFeasibleTour)
        }
    }
}

impl Solver for ExhaustiveSolver {
    fn name(&self) -> &str {
        "exhaustive"
    }

    fn policy(&self) -> TourPolicy {
        self.policy
    }

    fn do_solve(&mut self, matrix: &CostMatrix) -> Result<Tour> {
        let n = matrix.num_targets();
        if n > MAX_EXHAUSTIVE_TARGETS {
            return Err(Error::TooManyTargets { count: n, max: MAX_EXHAUSTIVE_TARGETS });
        }
        if n == 0 {
            return Ok(Tour { order: Vec::new(), cost: 0.0 });
        }
        let mut best = Tour { order: Vec::new(), cost: f64::INFINITY };
        // permutations() is lexicographic, strict '<' keeps the first optimum.
        for order in (1..=n).permutations(n) {
            let cost = matrix.tour_cost(&order, self.policy);
            if cost < best.cost {
                best = Tour { order, cost };
            }
        }
        if best.is_feasible() {
            Ok(best)
        } else {
            Err(Error::NoFeasibleTour)
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand::rngs::SmallRng;
    use super::*;

    fn random_matrix(num_targets: usize, seed: u64) -> CostMatrix {
        let mut rng = SmallRng::seed_from_u64(seed);
        let size = num_targets + 1;
        let mut rows = vec![vec![0.0; size]; size];
        for i in 0..size {
            for j in i + 1..size {
                let cost = rng.gen_range(1..50) as f64;
                rows[i][j] = cost;
                rows[j][i] = cost;
            }
        }
        CostMatrix::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_nearest_neighbor() {
        let matrix = CostMatrix::from_rows(&[
            vec![0.0, 4.0, 1.0, 9.0],
            vec![4.0, 0.0, 2.0, 3.0],
            vec![1.0, 2.0, 0.0, 8.0],
            vec![9.0, 3.0, 8.0, 0.0],
        ]).unwrap();
        let tour = NearestNeighborSolver { policy: TourPolicy::Open }
            .solve(&matrix).unwrap();
        assert_eq!(tour, Tour { order: vec![2, 1, 3], cost: 6.0 });
    }

    #[test]
    fn test_exhaustive_is_optimal() {
        let matrix = CostMatrix::from_rows(&[
            vec![0.0, 4.0, 1.0, 9.0],
            vec![4.0, 0.0, 2.0, 3.0],
            vec![1.0, 2.0, 0.0, 8.0],
            vec![9.0, 3.0, 8.0, 0.0],
        ]).unwrap();
        let open = ExhaustiveSolver { policy: TourPolicy::Open }
            .solve(&matrix).unwrap();
        assert_eq!(open, Tour { order: vec![2, 1, 3], cost: 6.0 });
        // Closed: 0-2-1-3-0 costs 15, 0-1-3-2-0 costs 16, 0-2-3-1-0 costs 16.
        let closed = ExhaustiveSolver { policy: TourPolicy::Closed }
            .solve(&matrix).unwrap();
        assert_eq!(closed.cost, 15.0);
    }

    #[test]
    fn test_exhaustive_limits() {
        let matrix = random_matrix(MAX_EXHAUSTIVE_TARGETS + 1, 0);
        assert_eq!(ExhaustiveSolver { policy: TourPolicy::Open }.solve(&matrix),
                   Err(Error::TooManyTargets { count: 10, max: 9 }));
        let empty = CostMatrix::from_rows(&[vec![0.0]]).unwrap();
        assert_eq!(ExhaustiveSolver { policy: TourPolicy::Open }.solve(&empty),
                   Ok(Tour { order: Vec::new(), cost: 0.0 }));
    }

    #[test]
    fn test_genetic_matches_exhaustive() {
        for seed in 0..10 {
            let matrix = random_matrix(6, seed);
            let exact = ExhaustiveSolver { policy: TourPolicy::Open }
                .solve(&matrix).unwrap();
            let mut genetic = GeneticSolver::new(
                HyperParams { seed, ..HyperParams::default_params(50, 150) },
                TourPolicy::Open);
            let found = genetic.solve(&matrix).unwrap();
            assert_eq!(found.cost, exact.cost, "seed {seed}");
        }
    }

    #[test]
    fn test_genetic_never_worse_than_greedy_on_average() {
        let mut genetic_total = 0.0;
        let mut greedy_total = 0.0;
        for seed in 0..10 {
            let matrix = random_matrix(12, seed);
            genetic_total += GeneticSolver::new(
                HyperParams { seed, ..HyperParams::default_params(60, 200) },
                TourPolicy::Closed).solve(&matrix).unwrap().cost;
            greedy_total += NearestNeighborSolver { policy: TourPolicy::Closed }
                .solve(&matrix).unwrap().cost;
        }
        assert!(genetic_total <= greedy_total,
                "genetic {genetic_total} vs greedy {greedy_total}");
    }

    #[test]
    fn test_infeasible() {
        let inf = f64::INFINITY;
        let matrix = CostMatrix::from_rows(&[
            vec![0.0, 1.0, inf],
            vec![1.0, 0.0, inf],
            vec![inf, inf, 0.0],
        ]).unwrap();
        assert_eq!(NearestNeighborSolver { policy: TourPolicy::Open }.solve(&matrix),
                   Err(Error::NoFeasibleTour));
        assert_eq!(ExhaustiveSolver { policy: TourPolicy::Open }.solve(&matrix),
                   Err(Error::NoFeasibleTour));
        assert_eq!(GeneticSolver::default().solve(&matrix),
                   Err(Error::NoFeasibleTour));
    }
}

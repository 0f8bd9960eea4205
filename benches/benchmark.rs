use criterion::{criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand::rngs::SmallRng;
use std::sync::Arc;

use tour_planner::cost_matrix::{BuildOptions, CostMatrix};
use tour_planner::genetic::HyperParams;
use tour_planner::grid::{Connectivity, Grid, Point};
use tour_planner::solvers::{GeneticSolver, NearestNeighborSolver, Solver};
use tour_planner::tour::TourPolicy;

const SIZE: usize = 100;
const NUM_TARGETS: usize = 20;

// 100x100 grid with ~20% obstacles, targets on free cells. Seeded so runs
// compare the same problem.
fn make_problem() -> (Arc<Grid>, Point, Vec<Point>) {
    let mut rng = SmallRng::seed_from_u64(1234);
    let values: Vec<u8> = (0..SIZE * SIZE)
        .map(|_| if rng.gen_bool(0.2) { 255 } else { 0 })
        .collect();
    let grid = Grid::new(SIZE, SIZE, 1.0, &values, 255)
        .expect("Couldn't build benchmark grid");
    let mut free_points = Vec::new();
    while free_points.len() < NUM_TARGETS + 1 {
        let point = Point::new(rng.gen_range(0.0..SIZE as f64),
                               rng.gen_range(0.0..SIZE as f64));
        let cell = grid.to_cell(point).expect("Point outside benchmark grid");
        if !grid.is_blocked(cell) {
            free_points.push(point);
        }
    }
    let agent = free_points.remove(0);
    (Arc::new(grid), agent, free_points)
}

fn options(threads: usize) -> BuildOptions {
    BuildOptions { connectivity: Connectivity::Eight, cache_paths: true, threads }
}

fn bench_cost_matrix(c: &mut Criterion) {
    let (grid, agent, targets) = make_problem();
    let mut group = c.benchmark_group("cost_matrix");
    group.bench_function("inline searches", |b| b.iter(|| {
        CostMatrix::build(&grid, agent, &targets, &options(1))
    }));
    group.bench_function("threaded searches", |b| b.iter(|| {
        CostMatrix::build(&grid, agent, &targets, &options(4))
    }));
    group.finish();
}

fn bench_solvers(c: &mut Criterion) {
    let (grid, agent, targets) = make_problem();
    let matrix = CostMatrix::build(&grid, agent, &targets, &options(4))
        .expect("Couldn't build benchmark cost matrix");
    let mut group = c.benchmark_group("solvers");
    group.bench_function("nearest neighbor", |b| b.iter(|| {
        let mut solver = NearestNeighborSolver { policy: TourPolicy::Open };
        solver.do_solve(&matrix)
    }));
    group.bench_function("genetic", |b| b.iter(|| {
        let mut solver = GeneticSolver::new(HyperParams::default(), TourPolicy::Open);
        solver.do_solve(&matrix)
    }));
    group.finish();
}

criterion_group!{
    name = benches;
    // Limit sample size given the slow processing. Results will be noisy.
    config = Criterion::default().sample_size(50);
    targets = bench_cost_matrix, bench_solvers,
}
criterion_main!(benches);

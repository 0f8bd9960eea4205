use itertools::Itertools;
use log::{debug, info};
use rustc_hash::FxHashMap;
use std::iter;
use std::sync::{mpsc, Arc};
use std::thread;

use crate::error::{Error, Result};
use crate::grid::{Cell, Connectivity, Grid, Point};
use crate::pathfinding::{Path, Pathfinder};
use crate::tour::{tour_legs, StopId, TourPolicy};

pub const DEFAULT_THREADS: usize = 4;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub connectivity: Connectivity,
    /// Keep every computed path so the route can be assembled without
    /// searching again.
    pub cache_paths: bool,
    /// Worker threads used for the pairwise searches. 0 or 1 runs inline.
    pub threads: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            connectivity: Connectivity::Four,
            cache_paths: true,
            threads: DEFAULT_THREADS,
        }
    }
}

type PairResult = (StopId, StopId, Result<Path>);

#[derive(Debug, Clone)]
pub struct CostMatrix {
    // Number of stops, i.e. targets + 1 for the agent.
    size: usize,
    // costs[from * size + to]
    costs: Vec<f64>,
    // Keyed by (low, high) stop ids, stored going from low to high.
    paths: FxHashMap<(StopId, StopId), Path>,
    // Cell of each stop. Empty when built from explicit costs.
    stops: Vec<Cell>,
    connectivity: Connectivity,
}

fn search_pairs(grid: &Grid, stops: &[Cell], pairs: &[(StopId, StopId)],
                connectivity: Connectivity) -> Vec<PairResult> {
    let mut pathfinder = Pathfinder::new(grid, connectivity);
    pairs.iter().map(|&(from, to)| {
        (from, to, pathfinder.shortest_path(stops[from], stops[to]))
    }).collect()
}

fn search_pairs_threaded(grid: &Arc<Grid>, stops: &Arc<Vec<Cell>>,
                         pairs: &Arc<Vec<(StopId, StopId)>>,
                         connectivity: Connectivity,
                         threads: usize) -> Result<Vec<PairResult>> {
    let mut handles = vec![];
    let (tx, rx) = mpsc::channel();
    for i in 0..threads {
        let tx = tx.clone();
        let grid = grid.clone();
        let stops = stops.clone();
        let pairs = pairs.clone();
        handles.push(thread::spawn(move || {
            let mut pathfinder = Pathfinder::new(&grid, connectivity);
            for j in (i..pairs.len()).step_by(threads) {
                let (from, to) = pairs[j];
                let path = pathfinder.shortest_path(stops[from], stops[to]);
                if tx.send((from, to, path)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);  // Drop the last sender, wait until all threads are done.
    let results: Vec<PairResult> = rx.iter().collect();
    for handle in handles {
        handle.join().map_err(|_| Error::WorkerFailed)?;
    }
    if results.len() != pairs.len() {
        return Err(Error::WorkerFailed);
    }
    Ok(results)
}

impl CostMatrix {
    /// Runs one search per unordered pair of stops among the agent and the
    /// targets, and fills both directions of the table with it.
    pub fn build(grid: &Arc<Grid>, agent: Point, targets: &[Point],
                 options: &BuildOptions) -> Result<Self> {
        let stops: Vec<Cell> = iter::once(agent).chain(targets.iter().copied())
            .map(|point| grid.to_cell(point))
            .collect::<Result<_>>()?;
        for (stop, &cell) in stops.iter().enumerate() {
            if grid.is_blocked(cell) {
                return Err(Error::UnreachableEndpoint { stop, cell });
            }
        }

        let size = stops.len();
        let pairs: Vec<(StopId, StopId)> = (0..size).tuple_combinations().collect();
        let threads = usize::min(options.threads, pairs.len());
        let results = if threads <= 1 {
            search_pairs(grid, &stops, &pairs, options.connectivity)
        } else {
            search_pairs_threaded(grid, &Arc::new(stops.clone()),
                                  &Arc::new(pairs.clone()),
                                  options.connectivity, threads)?
        };

        let mut costs = vec![0.0; size * size];
        let mut paths = FxHashMap::default();
        let mut unreachable = 0;
        for (from, to, path) in results {
            let path = path?;
            debug!("Stops {from}->{to}: cost {cost}, {len} steps",
                   cost = path.cost, len = path.steps.len());
            if !path.is_reachable() {
                unreachable += 1;
            }
            costs[from * size + to] = path.cost;
            costs[to * size + from] = path.cost;
            if options.cache_paths {
                paths.insert((from, to), path);
            }
        }

        info!("Cost matrix created: {} stops, {} searches, {} unreachable pairs",
              size, pairs.len(), unreachable);
        Ok(CostMatrix {
            size,
            costs,
            paths,
            stops,
            connectivity: options.connectivity,
        })
    }

    /// Table given directly, e.g. distances computed elsewhere. Row 0 is the
    /// agent. There are no cells attached, so paths can't be assembled.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(Error::InvalidCostMatrix("no agent row".to_string()));
        }
        let mut costs = Vec::with_capacity(size * size);
        for (from, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(Error::InvalidCostMatrix(
                    format!("row {from} has {} entries, expected {size}", row.len())));
            }
            for (to, &cost) in row.iter().enumerate() {
                if cost.is_nan() || cost < 0.0 {
                    return Err(Error::InvalidCostMatrix(
                        format!("bad cost {cost} at [{from}][{to}]")));
                }
                if from == to && cost != 0.0 {
                    return Err(Error::InvalidCostMatrix(
                        format!("non-zero diagonal at [{from}][{to}]")));
                }
                costs.push(cost);
            }
        }
        Ok(CostMatrix {
            size,
            costs,
            paths: FxHashMap::default(),
            stops: Vec::new(),
            connectivity: Connectivity::default(),
        })
    }

    #[inline]
    pub fn cost(&self, from: StopId, to: StopId) -> f64 {
        self.costs[from * self.size + to]
    }

    pub fn num_stops(&self) -> usize {
        self.size
    }

    pub fn num_targets(&self) -> usize {
        self.size - 1
    }

    pub fn stops(&self) -> &[Cell] {
        &self.stops
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Cached path between two stops, in the requested direction.
    pub fn path(&self, from: StopId, to: StopId) -> Option<Path> {
        if from <= to {
            self.paths.get(&(from, to)).cloned()
        } else {
            self.paths.get(&(to, from)).map(Path::reversed)
        }
    }

    pub fn tour_cost(&self, order: &[StopId], policy: TourPolicy) -> f64 {
        let mut total = 0.0;
        for (from, to) in tour_legs(order, policy) {
            let cost = self.cost(from, to);
            if cost.is_infinite() {
                return f64::INFINITY;
            }
            total += cost;
        }
        total
    }
}

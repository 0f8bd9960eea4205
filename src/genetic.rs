// Genetic algorithm over visiting orders of the targets.
//
// Each chromosome is a permutation of the target stop ids 1..=N. A generation
// is built from:
// - the best `elite_count` chromosomes of the previous one, untouched,
// - offspring of tournament-selected parents, crossed over (OX or PMX) and
//   mutated (swap or inversion) with a small probability.
// The population is kept sorted by cost, so a tournament only needs to
// compare indices.

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};

use crate::cost_matrix::CostMatrix;
use crate::error::{Error, Result};
use crate::tour::{is_permutation, StopId, Tour, TourPolicy, AGENT};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverOperator {
    /// Ordered crossover (OX): keep a slice of the first parent, fill the rest
    /// in the order the second parent visits them.
    #[default]
    Ordered,
    /// Partially mapped crossover (PMX): keep a slice of the first parent,
    /// the rest keeps the second parent's positions where possible.
    PartiallyMapped,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MutationOperator {
    /// Swap two stops.
    Swap,
    /// Reverse a sub-segment of the order (2-opt move).
    #[default]
    Inversion,
}

fn default_initial_temperature() -> f64 { 100.0 }
fn default_cooling_rate() -> f64 { 0.9 }
fn default_min_temperature() -> f64 { 5.0 }

/// Simulated annealing on top of the generations: an offspring worse than
/// its first parent survives with probability exp(-delta / T), otherwise the
/// parent takes its slot. T is multiplied by `cooling_rate` after every
/// generation and evolution stops once it is down to `min_temperature`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Annealing {
    #[serde(default = "default_initial_temperature")]
    pub initial_temperature: f64,

    /// In (0, 1).
    #[serde(default = "default_cooling_rate")]
    pub cooling_rate: f64,

    #[serde(default = "default_min_temperature")]
    pub min_temperature: f64,
}

impl Default for Annealing {
    fn default() -> Self {
        Annealing {
            initial_temperature: default_initial_temperature(),
            cooling_rate: default_cooling_rate(),
            min_temperature: default_min_temperature(),
        }
    }
}

fn default_mutation_probability() -> f32 { 0.2 }
fn default_tournament_size() -> usize { 3 }
fn default_elite_count() -> usize { 1 }
fn default_seed() -> u64 { 42 }

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HyperParams {
    /// Number of chromosomes in every generation.
    pub population_size: usize,

    /// Max number of generations to evolve.
    pub iterations: usize,

    /// Probability that an offspring gets mutated.
    #[serde(default = "default_mutation_probability")]
    pub mutation_probability: f32,

    /// Chromosomes drawn per tournament when picking a parent. Must be >= 2,
    /// a tournament of 1 would be uniform sampling.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,

    /// Best chromosomes copied as-is into the next generation.
    #[serde(default = "default_elite_count")]
    pub elite_count: usize,

    #[serde(default)]
    pub crossover: CrossoverOperator,

    #[serde(default)]
    pub mutation: MutationOperator,

    /// Stop early after this many generations without improvement.
    #[serde(default)]
    pub stall_generations: Option<usize>,

    /// Stop early once this much time was spent evolving.
    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    #[serde(default)]
    pub annealing: Option<Annealing>,

    /// Seed to use for randomness.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl HyperParams {
    pub fn default_params(population_size: usize, iterations: usize) -> Self {
        HyperParams {
            population_size,
            iterations,
            mutation_probability: default_mutation_probability(),
            tournament_size: default_tournament_size(),
            elite_count: default_elite_count(),
            crossover: CrossoverOperator::default(),
            mutation: MutationOperator::default(),
            stall_generations: None,
            time_limit_ms: None,
            annealing: None,
            seed: default_seed(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidHyperParams(msg));
        if self.population_size == 0 {
            return invalid("population_size must be positive".to_string());
        }
        if self.iterations == 0 {
            return invalid("iterations must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.mutation_probability) {
            return invalid(format!("mutation_probability must be in [0, 1], got {}",
                                   self.mutation_probability));
        }
        if self.tournament_size < 2 {
            return invalid(format!("tournament_size must be >= 2, got {}",
                                   self.tournament_size));
        }
        if self.elite_count == 0 || self.elite_count > self.population_size {
            return invalid(format!("elite_count must be in [1, {}], got {}",
                                   self.population_size, self.elite_count));
        }
        if let Some(annealing) = &self.annealing {
            if !(annealing.initial_temperature.is_finite()
                 && annealing.initial_temperature > 0.0) {
                return invalid(format!("initial_temperature must be positive, got {}",
                                       annealing.initial_temperature));
            }
            if !(annealing.cooling_rate > 0.0 && annealing.cooling_rate < 1.0) {
                return invalid(format!("cooling_rate must be in (0, 1), got {}",
                                       annealing.cooling_rate));
            }
            if !(annealing.min_temperature >= 0.0
                 && annealing.min_temperature < annealing.initial_temperature) {
                return invalid(format!(
                    "min_temperature must be in [0, {}), got {}",
                    annealing.initial_temperature, annealing.min_temperature));
            }
        }
        Ok(())
    }
}

impl Default for HyperParams {
    fn default() -> Self {
        HyperParams::default_params(50, 100)
    }
}

// Inclusive [start, end] bounds of a random slice of a chromosome.
fn random_segment(rng: &mut SmallRng, len: usize) -> (usize, usize) {
    let a = rng.gen_range(0..len);
    let b = rng.gen_range(0..len);
    (usize::min(a, b), usize::max(a, b))
}

pub fn random_chromosome(rng: &mut SmallRng, num_targets: usize) -> Vec<StopId> {
    let mut order: Vec<StopId> = (1..=num_targets).collect();
    order.shuffle(rng);
    order
}

pub fn ordered_crossover(rng: &mut SmallRng, first: &[StopId],
                         second: &[StopId]) -> Vec<StopId> {
    let n = first.len();
    if n < 2 {
        return first.to_vec();
    }
    let (start, end) = random_segment(rng, n);
    let mut child = vec![AGENT; n];
    let mut used = vec![false; n + 1];
    for i in start..=end {
        child[i] = first[i];
        used[first[i]] = true;
    }
    let open_slots = (0..start).chain(end + 1..n);
    let remaining = second.iter().filter(|&&stop| !used[stop]);
    for (slot, &stop) in open_slots.zip(remaining) {
        child[slot] = stop;
    }
    child
}

pub fn partially_mapped_crossover(rng: &mut SmallRng, first: &[StopId],
                                  second: &[StopId]) -> Vec<StopId> {
    let n = first.len();
    if n < 2 {
        return first.to_vec();
    }
    let (start, end) = random_segment(rng, n);
    let mut child = second.to_vec();
    // position[stop] = index of 'stop' in child
    let mut position = vec![0; n + 1];
    for (i, &stop) in child.iter().enumerate() {
        position[stop] = i;
    }
    // Swapping keeps a permutation at every step. Slots already placed in
    // [start, i) hold other stops, so they are never swapped out again.
    for i in start..=end {
        let wanted = first[i];
        let j = position[wanted];
        let displaced = child[i];
        child.swap(i, j);
        position[wanted] = i;
        position[displaced] = j;
    }
    child
}

pub fn swap_mutation(rng: &mut SmallRng, order: &mut [StopId]) {
    let n = order.len();
    if n < 2 {
        return;
    }
    let i = rng.gen_range(0..n);
    let mut j = rng.gen_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    order.swap(i, j);
}

pub fn inversion_mutation(rng: &mut SmallRng, order: &mut [StopId]) {
    let n = order.len();
    if n < 2 {
        return;
    }
    let start = rng.gen_range(0..n - 1);
    let end = rng.gen_range(start + 1..n);
    order[start..=end].reverse();
}

// Index of the tournament winner in a population sorted by cost.
fn tournament(rng: &mut SmallRng, population_len: usize, size: usize) -> usize {
    let mut best = rng.gen_range(0..population_len);
    for _ in 1..size {
        best = usize::min(best, rng.gen_range(0..population_len));
    }
    best
}

// Metropolis acceptance. An infinite child never replaces a feasible parent.
fn accepts(rng: &mut SmallRng, parent_cost: f64, child_cost: f64,
           temperature: f64) -> bool {
    if child_cost <= parent_cost {
        return true;
    }
    let probability = (-(child_cost - parent_cost) / temperature).exp();
    rng.gen::<f64>() < probability
}

/// Debug struct to log as JSON for visualization, one entry per generation.
#[derive(Serialize, Debug, Clone, Default)]
pub struct EvolutionVisualization {
    pub generations: Vec<GenerationVisualization>,
}

#[derive(Serialize, Debug, Clone)]
pub struct GenerationVisualization {
    pub generation: usize,
    pub best_cost: f64,
    pub best_order: Vec<StopId>,
    pub feasible: usize,
    pub mean_feasible_cost: Option<f64>,
}

impl GenerationVisualization {
    fn new(generation: usize, population: &[Tour]) -> Self {
        let feasible: Vec<f64> = population.iter().filter(|t| t.is_feasible())
            .map(|t| t.cost).collect();
        let mean_feasible_cost = if feasible.is_empty() {
            None
        } else {
            Some(feasible.iter().sum::<f64>() / feasible.len() as f64)
        };
        let (best_cost, best_order) = match population.first() {
            Some(best) => (best.cost, best.order.clone()),
            None => (f64::INFINITY, Vec::new()),
        };
        GenerationVisualization {
            generation,
            best_cost,
            best_order,
            feasible: feasible.len(),
            mean_feasible_cost,
        }
    }
}

pub struct Evolution<'a> {
    hyperparams: HyperParams,
    matrix: &'a CostMatrix,
    policy: TourPolicy,
    num_targets: usize,
    // Sorted by cost, best first.
    population: Vec<Tour>,
    best: Option<Tour>,
    generation: usize,
    // Best-so-far cost after each generation, starting with the initial one.
    history: Vec<f64>,
    // Only set when annealing.
    temperature: Option<f64>,
    rng: SmallRng,

    // Used for debugging purposes. If set, is populated & debug-logged.
    visualization: Option<EvolutionVisualization>,
}

impl<'a> Evolution<'a> {
    pub fn new(matrix: &'a CostMatrix, hyperparams: HyperParams,
               policy: TourPolicy) -> Result<Self> {
        hyperparams.validate()?;
        let visualization = if cfg!(feature = "visualization_dump") {
            Some(EvolutionVisualization::default())
        } else {
            None
        };
        let temperature = hyperparams.annealing
            .map(|annealing| annealing.initial_temperature);
        Ok(Evolution {
            rng: SmallRng::seed_from_u64(hyperparams.seed),
            hyperparams,
            matrix,
            policy,
            num_targets: matrix.num_targets(),
            population: Vec::new(),
            best: None,
            generation: 0,
            history: Vec::new(),
            temperature,
            visualization,
        })
    }

    pub fn population(&self) -> &[Tour] {
        &self.population
    }

    pub fn best(&self) -> Option<&Tour> {
        self.best.as_ref()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    fn best_cost(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |best| best.cost)
    }

    fn evaluate(&self, order: Vec<StopId>) -> Tour {
        debug_assert!(is_permutation(&order, self.num_targets),
                      "invalid chromosome {:?}", order);
        let cost = self.matrix.tour_cost(&order, self.policy);
        Tour { order, cost }
    }

    // Sort, then record the generation's best.
    fn finish_generation(&mut self) {
        self.population.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        if let Some(leader) = self.population.first() {
            if self.best.is_none() || leader.cost < self.best_cost() {
                self.best = Some(leader.clone());
            }
        }
        self.history.push(self.best_cost());
        if let Some(viz) = &mut self.visualization {
            viz.generations.push(GenerationVisualization::new(self.generation,
                                                              &self.population));
        }
    }

    /// Fills generation 0 with random chromosomes.
    pub fn initialize(&mut self) {
        let mut population = Vec::with_capacity(self.hyperparams.population_size);
        for _ in 0..self.hyperparams.population_size {
            let order = random_chromosome(&mut self.rng, self.num_targets);
            population.push(self.evaluate(order));
        }
        self.population = population;
        self.generation = 0;
        self.best = None;
        self.history.clear();
        self.temperature = self.hyperparams.annealing
            .map(|annealing| annealing.initial_temperature);
        self.finish_generation();
    }

    /// Produces the next generation from the current one.
    pub fn step(&mut self) {
        if self.population.is_empty() {
            self.initialize();
        }
        let size = self.hyperparams.population_size;
        // A population of 1 has no room for offspring besides its elite, the
        // best-so-far record keeps the elitism guarantee in that case.
        let elites = usize::min(self.hyperparams.elite_count, size - 1);
        let mut next: Vec<Tour> = self.population[..elites].to_vec();
        while next.len() < size {
            let len = self.population.len();
            let first_idx = tournament(&mut self.rng, len,
                                       self.hyperparams.tournament_size);
            let second_idx = tournament(&mut self.rng, len,
                                        self.hyperparams.tournament_size);
            let (first, second) = (&self.population[first_idx].order,
                                   &self.population[second_idx].order);
            let mut child = match self.hyperparams.crossover {
                CrossoverOperator::Ordered =>
                    ordered_crossover(&mut self.rng, first, second),
                CrossoverOperator::PartiallyMapped =>
                    partially_mapped_crossover(&mut self.rng, first, second),
            };
            if self.rng.gen::<f32>() < self.hyperparams.mutation_probability {
                match self.hyperparams.mutation {
                    MutationOperator::Swap => swap_mutation(&mut self.rng, &mut child),
                    MutationOperator::Inversion =>
                        inversion_mutation(&mut self.rng, &mut child),
                }
            }
            let child = self.evaluate(child);
            let survivor = match self.temperature {
                Some(temperature) => {
                    let parent = &self.population[first_idx];
                    if accepts(&mut self.rng, parent.cost, child.cost, temperature) {
                        child
                    } else {
                        parent.clone()
                    }
                },
                None => child,
            };
            next.push(survivor);
        }
        self.population = next;
        self.generation += 1;
        if let (Some(temperature), Some(annealing)) =
            (self.temperature, self.hyperparams.annealing) {
            self.temperature = Some(temperature * annealing.cooling_rate);
        }
        self.finish_generation();
    }

    pub fn run(&mut self) -> Result<Tour> {
        let start = Instant::now();
        let time_limit = self.hyperparams.time_limit_ms.map(Duration::from_millis);
        if self.population.is_empty() {
            self.initialize();
        }
        let mut stalled = 0;
        while self.generation < self.hyperparams.iterations {
            let previous = self.best_cost();
            self.step();
            debug!("GA generation #{gen}/{total}: best cost {best}",
                   gen = self.generation, total = self.hyperparams.iterations,
                   best = self.best_cost());
            if let (Some(temperature), Some(annealing)) =
                (self.temperature, self.hyperparams.annealing) {
                if temperature <= annealing.min_temperature {
                    info!("[GA] Cooled down to {temperature:.3}, stopping at #{}",
                          self.generation);
                    break;
                }
            }
            stalled = if self.best_cost() < previous { 0 } else { stalled + 1 };
            if let Some(limit) = self.hyperparams.stall_generations {
                if stalled >= limit {
                    info!("[GA] No improvement for {stalled} generations, stopping at #{}",
                          self.generation);
                    break;
                }
            }
            if let Some(limit) = time_limit {
                if start.elapsed() >= limit {
                    info!("[GA] Time limit of {limit:?} reached at generation #{}",
                          self.generation);
                    break;
                }
            }
        }
        if let Some(viz) = &self.visualization {
            debug!("[VIZ_DATA] {}", json!(viz));
        }
        match &self.best {
            Some(best) if best.is_feasible() => Ok(best.clone()),
            _ => {
                warn!("[GA] Every tour evaluated crosses an unreachable pair.");
                Err(Error::NoFeasibleTour)
            }
        }
    }
}

/// Best visiting order found for the targets of `matrix`.
/// No targets, or a single one, don't need any evolution.
pub fn solve(matrix: &CostMatrix, hyperparams: &HyperParams,
             policy: TourPolicy) -> Result<Tour> {
    hyperparams.validate()?;
    let order: Vec<StopId> = match matrix.num_targets() {
        0 => return Ok(Tour { order: Vec::new(), cost: 0.0 }),
        1 => vec![1],
        _ => return Evolution::new(matrix, hyperparams.clone(), policy)?.run(),
    };
    let tour = Tour { cost: matrix.tour_cost(&order, policy), order };
    if tour.is_feasible() {
        Ok(tour)
    } else {
        Err(Error::NoFeasibleTour)
    }
}

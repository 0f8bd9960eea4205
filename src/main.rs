use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{error, info};
use serde_json::Value;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;

use tour_planner::cost_matrix::{BuildOptions, DEFAULT_THREADS};
use tour_planner::error::Error as PlannerError;
use tour_planner::genetic::HyperParams;
use tour_planner::grid::Connectivity;
use tour_planner::planner::plan;
use tour_planner::scenario::Scenario;
use tour_planner::solvers::{ExhaustiveSolver, GeneticSolver, NearestNeighborSolver, Solver};
use tour_planner::tour::TourPolicy;

#[derive(ValueEnum, Clone, Copy)]
enum SolverName {
    /// Genetic algorithm over visiting orders.
    Genetic,
    /// Greedy nearest-neighbor solver.
    NearestNeighbor,
    /// Tries every order. Only for a handful of targets.
    Exhaustive,
}

#[derive(ValueEnum, Clone, Copy)]
enum ConnectivityArg {
    /// Orthogonal moves only.
    Four,
    /// Orthogonal and diagonal moves.
    Eight,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario JSON file: world, agent position and targets.
    #[arg(long)]
    scenario: String,

    /// Solver implementation to use to find a visiting order.
    #[arg(short, long, value_enum, default_value_t = SolverName::Genetic)]
    solver: SolverName,

    /// When using genetic, hyperparams JSON file to use.
    #[arg(long)]
    hyperparams_file: Option<String>,

    /// Overrides the genetic population size.
    #[arg(long)]
    population_size: Option<usize>,

    /// Overrides the genetic number of generations.
    #[arg(long)]
    iterations: Option<usize>,

    /// Overrides the genetic random seed.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = ConnectivityArg::Four)]
    connectivity: ConnectivityArg,

    /// Come back to the agent's start after the last target.
    #[arg(long)]
    closed_tour: bool,

    /// Threads used to compute the pairwise paths.
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Don't keep pairwise paths, search the chosen legs again instead.
    #[arg(long)]
    no_path_cache: bool,
}

#[derive(Error, Debug)]
enum RunError {
    #[error("Failed reading an input file")]
    ReadError(#[from] std::io::Error),
    #[error("Failed parsing an input file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Planning failed: {0}")]
    PlanError(#[from] PlannerError),
}

fn load_hyperparams(cli: &Cli) -> Result<HyperParams, RunError> {
    let mut hyperparams = match &cli.hyperparams_file {
        Some(filename) => {
            let hyperparams_data = std::fs::read_to_string(filename)?;
            info!("[GA] Loading hyperparams from {filename}");
            let parsed: Value = serde_json::from_str(&hyperparams_data)?;
            serde_json::from_value(parsed)?
        },
        None => {
            info!("[GA] Using default hyperparams.");
            HyperParams::default()
        },
    };
    if let Some(population_size) = cli.population_size {
        hyperparams.population_size = population_size;
    }
    if let Some(iterations) = cli.iterations {
        hyperparams.iterations = iterations;
    }
    if let Some(seed) = cli.seed {
        hyperparams.seed = seed;
    }
    Ok(hyperparams)
}

fn new_solver(cli: &Cli) -> Result<Box<dyn Solver>, RunError> {
    let policy = if cli.closed_tour { TourPolicy::Closed } else { TourPolicy::Open };
    let solver: Box<dyn Solver> = match cli.solver {
        SolverName::Genetic => Box::new(GeneticSolver::new(load_hyperparams(cli)?, policy)),
        SolverName::NearestNeighbor => Box::new(NearestNeighborSolver { policy }),
        SolverName::Exhaustive => Box::new(ExhaustiveSolver { policy }),
    };
    Ok(solver)
}

fn run(cli: &Cli) -> Result<String, RunError> {
    let scenario_data = std::fs::read_to_string(&cli.scenario)?;
    let scenario = Scenario::from_json(&scenario_data)?;
    info!("Loaded scenario {} with {} targets", cli.scenario, scenario.targets.len());

    let grid = Arc::new(scenario.world.to_grid()?);
    let options = BuildOptions {
        connectivity: cli.connectivity.into(),
        cache_paths: !cli.no_path_cache,
        threads: cli.threads,
    };
    let mut solver = new_solver(cli)?;
    let plan = plan(&grid, scenario.agent, &scenario.targets, solver.as_mut(), &options)?;
    Ok(serde_json::to_string_pretty(&plan)?)
}

fn main() -> ExitCode {
    // Load .env file
    dotenvy::dotenv().ok();
    // Init logger with default value of info
    // This can be overriden with RUST_LOG env var
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        },
        Err(err) => {
            error!("Error while planning with underlying error:");
            error!("  {}", err);
            ExitCode::FAILURE
        },
    }
}

use thiserror::Error;

use crate::grid::Cell;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid world description: {0}")]
    InvalidWorld(String),

    /// A point in meters that falls outside of the mapped world.
    #[error("Point ({x}, {y}) is outside of the mapped world")]
    OutOfBounds { x: f64, y: f64 },

    /// A path query whose start or goal cell is itself blocked.
    #[error("Cell {cell:?} is blocked and can't be used as a path endpoint")]
    InvalidEndpoint { cell: Cell },

    /// The agent (stop 0) or a target sits on a blocked cell. This is a
    /// configuration error, not a missing route between two stops.
    #[error("Stop #{stop} at {cell:?} is on a blocked cell")]
    UnreachableEndpoint { stop: usize, cell: Cell },

    #[error("Invalid cost matrix: {0}")]
    InvalidCostMatrix(String),

    #[error("Invalid hyperparams: {0}")]
    InvalidHyperParams(String),

    #[error("No feasible tour: every visiting order crosses an unreachable pair")]
    NoFeasibleTour,

    #[error("Too many targets for this solver: {count} (max {max})")]
    TooManyTargets { count: usize, max: usize },

    #[error("A cost matrix worker thread failed")]
    WorkerFailed,
}

pub type Result<T> = std::result::Result<T, Error>;

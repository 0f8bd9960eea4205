pub mod assembler;
pub mod cost_matrix;
pub mod error;
pub mod genetic;
pub mod grid;
pub mod pathfinding;
pub mod planner;
pub mod scenario;
pub mod solvers;
pub mod tour;

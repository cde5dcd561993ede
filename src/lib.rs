//! route-sequencer
//!
//! Single-vehicle route sequencing: distance matrices with provider fallback,
//! advisory constraint validation, four interchangeable heuristics and a
//! benchmark harness to compare them.

pub mod model;
pub mod haversine;
pub mod traits;
pub mod cancellation;
pub mod error;
pub mod cache;
pub mod matrix;
pub mod constraints;
pub mod route;
pub mod nearest_neighbor;
pub mod two_opt;
pub mod genetic;
pub mod annealing;
pub mod osrm;
pub mod benchmark;
pub mod solver;

pub use cancellation::CancellationToken;
pub use error::{OptimizerError, RoutingError};
pub use model::{
    Algorithm, Coordinate, Job, OptimizationObjective, OptimizationParameters, OptimizationResult,
    Technician,
};
pub use solver::{ComparisonResult, RouteEngine, benchmark, compare, optimize};

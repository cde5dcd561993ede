//! Core seams of the engine.
//!
//! Routing providers, the pairwise cache and the optimizer family are all
//! expressed as traits so callers can plug in their own implementations.

use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;
use crate::error::{OptimizerError, RoutingError};
use crate::matrix::DistanceMatrix;
use crate::model::{Algorithm, Coordinate, OptimizationObjective, OptimizationParameters, OptimizationResult};

/// Travel between two locations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Leg {
    pub distance_km: f64,
    pub duration_seconds: i64,
}

impl Leg {
    pub const ZERO: Leg = Leg {
        distance_km: 0.0,
        duration_seconds: 0,
    };

    pub fn travel_hours(&self) -> f64 {
        self.duration_seconds as f64 / 3600.0
    }

    pub fn travel_minutes(&self) -> f64 {
        self.duration_seconds as f64 / 60.0
    }
}

/// Source of real travel distances and durations.
///
/// Any call may fail; the matrix builder downgrades failures to a
/// great-circle estimate for the affected pair only.
pub trait RoutingProvider: Send + Sync {
    fn distance_duration(&self, from: Coordinate, to: Coordinate) -> Result<Leg, RoutingError>;

    /// Whole-table lookup. Providers without a batch endpoint keep the default.
    fn distance_matrix(&self, _locations: &[Coordinate]) -> Result<DistanceMatrix, RoutingError> {
        Err(RoutingError::Unsupported)
    }
}

/// Pairwise leg cache shared across matrix builds.
///
/// A miss must never change an answer, only its cost.
pub trait DistanceCache: Send + Sync {
    fn get(&self, from: Coordinate, to: Coordinate) -> Option<Leg>;

    fn insert(&self, from: Coordinate, to: Coordinate, leg: Leg);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);
}

/// One interchangeable sequencing heuristic.
pub trait RouteOptimizer: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn supports_objective(&self, objective: OptimizationObjective) -> bool;

    /// Sequence the jobs in `parameters`.
    ///
    /// Cancellation yields the best result found so far, never an error.
    fn optimize(
        &self,
        parameters: &OptimizationParameters,
        cancellation: &CancellationToken,
    ) -> Result<OptimizationResult, OptimizerError>;
}

//! Nearest-neighbor constructive heuristic.
//!
//! Starting from the start location, repeatedly visit the unvisited job
//! with the cheapest leg under the objective. O(n²).
//!
//! Also seeds [`crate::two_opt`] and [`crate::annealing`].

use std::sync::Arc;
use std::time::Instant;

use crate::cancellation::CancellationToken;
use crate::error::OptimizerError;
use crate::matrix::MatrixBuilder;
use crate::model::{
    Algorithm, OptimizationMetrics, OptimizationObjective, OptimizationParameters, OptimizationResult,
};
use crate::route::{RouteContext, is_sequencing_objective};
use crate::traits::RouteOptimizer;

/// Greedy order plus the number of leg costs evaluated to build it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Construction {
    pub order: Vec<usize>,
    pub evaluations: usize,
}

/// Builds the greedy order. Cancellation returns the partial order.
pub(crate) fn construct(ctx: &RouteContext<'_>, cancellation: &CancellationToken) -> Construction {
    let n = ctx.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut current: Option<usize> = None;
    let mut evaluations = 0;

    while order.len() < n {
        if cancellation.is_cancelled() {
            break;
        }

        let mut best: Option<(usize, f64)> = None;
        for candidate in (0..n).filter(|&i| !visited[i]) {
            let cost = ctx.step_cost(current, candidate);
            evaluations += 1;
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((candidate, cost));
            }
        }

        let Some((next, _)) = best else {
            break;
        };
        visited[next] = true;
        order.push(next);
        current = Some(next);
    }

    Construction { order, evaluations }
}

/// Nearest-neighbor result for an already resolved context.
pub(crate) fn result_for(
    ctx: &RouteContext<'_>,
    construction: &Construction,
    started: Instant,
) -> OptimizationResult {
    if ctx.is_empty() {
        return ctx.empty_result(Algorithm::NearestNeighbor, started);
    }

    let cost = ctx.route_cost(&construction.order);
    let metrics = OptimizationMetrics::single_pass(cost, construction.evaluations);
    ctx.finish(Algorithm::NearestNeighbor, &construction.order, started, 1, metrics)
}

/// Greedy baseline optimizer.
#[derive(Debug, Clone, Default)]
pub struct NearestNeighborOptimizer {
    builder: Arc<MatrixBuilder>,
}

impl NearestNeighborOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `builder` (and its routing provider) for the initial matrix.
    pub fn with_matrix_builder(builder: Arc<MatrixBuilder>) -> Self {
        Self { builder }
    }
}

impl RouteOptimizer for NearestNeighborOptimizer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::NearestNeighbor
    }

    fn supports_objective(&self, objective: OptimizationObjective) -> bool {
        is_sequencing_objective(objective)
    }

    fn optimize(
        &self,
        parameters: &OptimizationParameters,
        cancellation: &CancellationToken,
    ) -> Result<OptimizationResult, OptimizerError> {
        let started = Instant::now();
        let ctx = RouteContext::new(Algorithm::NearestNeighbor, parameters, &self.builder)?;
        let construction = construct(&ctx, cancellation);
        Ok(result_for(&ctx, &construction, started))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{Coordinate, Job, Technician};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn params(points: &[(f64, f64)]) -> OptimizationParameters {
        let jobs = points
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| {
                Job::new(format!("j{}", i), date()).with_location(Coordinate::new(lat, lng))
            })
            .collect();
        OptimizationParameters::new(jobs, Technician::new("tech"), date())
            .with_start(Coordinate::new(0.0, 0.0))
    }

    #[test]
    fn visits_closest_job_first() {
        let p = params(&[(0.3, 0.0), (0.1, 0.0), (0.2, 0.0)]);
        let result = NearestNeighborOptimizer::new()
            .optimize(&p, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.job_ids(), vec!["j1", "j2", "j0"]);
        assert_eq!(result.algorithm, Algorithm::NearestNeighbor);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn metrics_have_no_improvement_phase() {
        let p = params(&[(0.3, 0.0), (0.1, 0.0), (0.2, 0.0)]);
        let result = NearestNeighborOptimizer::new()
            .optimize(&p, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.metrics.initial_cost, result.metrics.final_cost);
        assert_eq!(result.metrics.cost_history, vec![result.metrics.final_cost]);
        // 3 + 2 + 1 candidate evaluations
        assert_eq!(result.metrics.evaluations, 6);
        assert!(!result.is_optimal);
    }

    #[test]
    fn cancelled_construction_is_partial() {
        let p = params(&[(0.3, 0.0), (0.1, 0.0)]);
        let result = NearestNeighborOptimizer::new()
            .optimize(&p, &CancellationToken::cancelled())
            .unwrap();
        assert!(result.stops.is_empty());
        assert_eq!(result.metrics.cost_history.len(), 1);
    }

    #[test]
    fn empty_input_reports_reason() {
        let p = params(&[]);
        let result = NearestNeighborOptimizer::new()
            .optimize(&p, &CancellationToken::new())
            .unwrap();
        assert!(result.stops.is_empty());
        assert!(result.violations.iter().any(|v| v == "no jobs to optimize"));
    }
}

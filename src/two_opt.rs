//! 2-opt local search seeded by nearest neighbor.
//!
//! # Algorithm
//!
//! Sweep every position pair `(i, j)`, `i < j`, and evaluate the route with
//! the segment `[i..=j]` reversed. A strictly cheaper route is accepted
//! immediately and the sweep continues from it. Stops after a sweep without
//! improvement, after the sweep cap, or on cancellation.
//!
//! Unlike the classic edge-delta formulation, each candidate is scored with
//! the full objective, so revenue and return-leg terms stay exact.

use std::sync::Arc;
use std::time::Instant;

use crate::cancellation::CancellationToken;
use crate::error::OptimizerError;
use crate::matrix::MatrixBuilder;
use crate::model::{
    Algorithm, OptimizationMetrics, OptimizationObjective, OptimizationParameters, OptimizationResult,
};
use crate::nearest_neighbor::{construct, result_for};
use crate::route::{RouteContext, is_sequencing_objective};
use crate::traits::RouteOptimizer;

/// Minimum cost decrease that counts as an improvement.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct TwoOptConfig {
    /// Upper bound on sweeps; the effective cap is `min(max_sweeps, n²)`.
    pub max_sweeps: usize,
}

impl Default for TwoOptConfig {
    fn default() -> Self {
        Self { max_sweeps: 1000 }
    }
}

impl TwoOptConfig {
    pub fn with_max_sweeps(mut self, sweeps: usize) -> Self {
        self.max_sweeps = sweeps;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TwoOptOptimizer {
    builder: Arc<MatrixBuilder>,
    config: TwoOptConfig,
}

impl TwoOptOptimizer {
    pub fn new(config: TwoOptConfig) -> Self {
        Self {
            builder: Arc::default(),
            config,
        }
    }

    pub fn with_matrix_builder(mut self, builder: Arc<MatrixBuilder>) -> Self {
        self.builder = builder;
        self
    }
}

impl RouteOptimizer for TwoOptOptimizer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::TwoOpt
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
        let ctx = RouteContext::new(Algorithm::TwoOpt, parameters, &self.builder)?;

        let seed = construct(&ctx, cancellation);
        if seed.order.is_empty() {
            return Ok(result_for(&ctx, &seed, started));
        }

        let mut route = seed.order;
        let n = route.len();
        let mut best_cost = ctx.route_cost(&route);
        let mut metrics = OptimizationMetrics::single_pass(best_cost, seed.evaluations);

        let max_sweeps = self.config.max_sweeps.min(n * n);
        let mut sweeps = 0;
        let mut improvements = 0;

        while sweeps < max_sweeps {
            if cancellation.is_cancelled() {
                break;
            }
            sweeps += 1;

            let mut improved = false;
            for i in 0..n.saturating_sub(1) {
                for j in (i + 1)..n {
                    route[i..=j].reverse();
                    let cost = ctx.route_cost(&route);
                    metrics.evaluations += 1;

                    if cost < best_cost - IMPROVEMENT_EPSILON {
                        best_cost = cost;
                        metrics.cost_history.push(cost);
                        improvements += 1;
                        improved = true;
                    } else {
                        route[i..=j].reverse();
                    }
                }
            }

            if !improved {
                break;
            }
        }

        metrics.final_cost = best_cost;
        metrics.set_extra("sweeps", sweeps as f64);
        metrics.set_extra("improvements", improvements as f64);
        metrics.set_extra("max_sweeps", max_sweeps as f64);

        Ok(ctx.finish(Algorithm::TwoOpt, &route, started, sweeps, metrics))
    }
}

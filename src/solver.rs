//! Engine facade: one-shot optimization, algorithm comparison and benchmarking.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annealing::{AnnealingConfig, SimulatedAnnealingOptimizer};
use crate::benchmark::{BenchmarkConfig, BenchmarkHarness, BenchmarkReport};
use crate::cancellation::CancellationToken;
use crate::error::OptimizerError;
use crate::genetic::{GeneticConfig, GeneticOptimizer};
use crate::matrix::MatrixBuilder;
use crate::model::{Algorithm, OptimizationParameters, OptimizationResult};
use crate::nearest_neighbor::NearestNeighborOptimizer;
use crate::traits::{RouteOptimizer, RoutingProvider};
use crate::two_opt::{TwoOptConfig, TwoOptOptimizer};

/// Outcome of running several algorithms over the same input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Lowest-cost result; ties go to the earlier algorithm in the request.
    pub best: OptimizationResult,
    pub results: Vec<OptimizationResult>,
    /// Flat `algorithm.metric -> value` view of every result.
    pub metrics: BTreeMap<String, f64>,
}

impl ComparisonResult {
    pub fn result_for(&self, algorithm: Algorithm) -> Option<&OptimizationResult> {
        self.results.iter().find(|result| result.algorithm == algorithm)
    }
}

/// Configured optimizer family sharing one matrix builder (and its cache).
#[derive(Debug, Clone, Default)]
pub struct RouteEngine {
    builder: Arc<MatrixBuilder>,
    two_opt: TwoOptConfig,
    genetic: GeneticConfig,
    annealing: AnnealingConfig,
}

impl RouteEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matrix_builder(mut self, builder: MatrixBuilder) -> Self {
        self.builder = Arc::new(builder);
        self
    }

    /// Shorthand for a default builder around `provider`.
    pub fn with_provider(self, provider: Arc<dyn RoutingProvider>) -> Self {
        self.with_matrix_builder(MatrixBuilder::new().with_provider(provider))
    }

    pub fn with_two_opt_config(mut self, config: TwoOptConfig) -> Self {
        self.two_opt = config;
        self
    }

    pub fn with_genetic_config(mut self, config: GeneticConfig) -> Self {
        self.genetic = config;
        self
    }

    pub fn with_annealing_config(mut self, config: AnnealingConfig) -> Self {
        self.annealing = config;
        self
    }

    pub fn matrix_builder(&self) -> &Arc<MatrixBuilder> {
        &self.builder
    }

    pub fn optimizer(&self, algorithm: Algorithm) -> Box<dyn RouteOptimizer> {
        let builder = Arc::clone(&self.builder);
        match algorithm {
            Algorithm::NearestNeighbor => Box::new(NearestNeighborOptimizer::with_matrix_builder(builder)),
            Algorithm::TwoOpt => {
                Box::new(TwoOptOptimizer::new(self.two_opt.clone()).with_matrix_builder(builder))
            }
            Algorithm::Genetic => {
                Box::new(GeneticOptimizer::new(self.genetic.clone()).with_matrix_builder(builder))
            }
            Algorithm::SimulatedAnnealing => Box::new(
                SimulatedAnnealingOptimizer::new(self.annealing.clone()).with_matrix_builder(builder),
            ),
        }
    }

    pub fn optimize(
        &self,
        parameters: &OptimizationParameters,
        algorithm: Algorithm,
        cancellation: &CancellationToken,
    ) -> Result<OptimizationResult, OptimizerError> {
        info!(
            algorithm = algorithm.as_str(),
            jobs = parameters.jobs.len(),
            objective = %parameters.objective,
            "optimizing route"
        );
        self.optimizer(algorithm).optimize(parameters, cancellation)
    }

    /// Runs each requested algorithm once and picks the cheapest result.
    ///
    /// Algorithms that do not support the objective are skipped; if none
    /// remain the call fails with [`OptimizerError::NoAlgorithms`].
    pub fn compare(
        &self,
        parameters: &OptimizationParameters,
        algorithms: &[Algorithm],
        cancellation: &CancellationToken,
    ) -> Result<ComparisonResult, OptimizerError> {
        info!(
            algorithms = algorithms.len(),
            jobs = parameters.jobs.len(),
            "comparing algorithms"
        );

        let mut results = Vec::with_capacity(algorithms.len());
        for &algorithm in algorithms {
            let optimizer = self.optimizer(algorithm);
            if !optimizer.supports_objective(parameters.objective) {
                debug!(algorithm = algorithm.as_str(), "skipping unsupported algorithm");
                continue;
            }
            results.push(optimizer.optimize(parameters, cancellation)?);
        }

        let best = results
            .iter()
            .enumerate()
            .min_by(|(ia, a), (ib, b)| a.total_cost.total_cmp(&b.total_cost).then(ia.cmp(ib)))
            .map(|(_, result)| result.clone())
            .ok_or(OptimizerError::NoAlgorithms)?;

        let metrics = comparison_metrics(&results);
        Ok(ComparisonResult {
            best,
            results,
            metrics,
        })
    }

    /// Benchmarks every algorithm `runs` times.
    pub fn benchmark(
        &self,
        parameters: &OptimizationParameters,
        runs: usize,
        cancellation: &CancellationToken,
    ) -> BenchmarkReport {
        self.benchmark_with(parameters, BenchmarkConfig::default().with_runs(runs), cancellation)
    }

    pub fn benchmark_with(
        &self,
        parameters: &OptimizationParameters,
        config: BenchmarkConfig,
        cancellation: &CancellationToken,
    ) -> BenchmarkReport {
        info!(runs = config.runs, jobs = parameters.jobs.len(), "benchmarking algorithms");
        let optimizers = Algorithm::ALL.iter().map(|&a| self.optimizer(a)).collect();
        BenchmarkHarness::new(optimizers, config).run(parameters, cancellation)
    }
}

fn comparison_metrics(results: &[OptimizationResult]) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();
    for result in results {
        let name = result.algorithm.as_str();
        metrics.insert(format!("{}.cost", name), result.total_cost);
        metrics.insert(format!("{}.distance_km", name), result.total_distance_km);
        metrics.insert(format!("{}.duration_minutes", name), result.total_duration_minutes);
        metrics.insert(
            format!("{}.time_ms", name),
            result.optimization_time.as_secs_f64() * 1000.0,
        );
        metrics.insert(format!("{}.evaluations", name), result.evaluations as f64);
        metrics.insert(
            format!("{}.improvement_pct", name),
            result.metrics.improvement_percentage(),
        );
        metrics.insert(format!("{}.violations", name), result.violations.len() as f64);
    }
    metrics
}

/// [`RouteEngine::optimize`] on a default engine.
pub fn optimize(
    parameters: &OptimizationParameters,
    algorithm: Algorithm,
    cancellation: &CancellationToken,
) -> Result<OptimizationResult, OptimizerError> {
    RouteEngine::default().optimize(parameters, algorithm, cancellation)
}

/// [`RouteEngine::compare`] on a default engine.
pub fn compare(
    parameters: &OptimizationParameters,
    algorithms: &[Algorithm],
    cancellation: &CancellationToken,
) -> Result<ComparisonResult, OptimizerError> {
    RouteEngine::default().compare(parameters, algorithms, cancellation)
}

/// [`RouteEngine::benchmark`] on a default engine.
pub fn benchmark(
    parameters: &OptimizationParameters,
    runs: usize,
    cancellation: &CancellationToken,
) -> BenchmarkReport {
    RouteEngine::default().benchmark(parameters, runs, cancellation)
}

//! Simulated annealing seeded by nearest neighbor.
//!
//! Geometric cooling `T_{k+1} = alpha * T_k` with a fixed number of neighbor
//! evaluations per temperature level. Neighbors come from three moves chosen
//! uniformly: swap two positions, reverse a segment, relocate one job.
//! Worse neighbors are accepted with probability `exp(-delta / T)`.
//!
//! The best route ever seen is kept apart from the working route.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cancellation::CancellationToken;
use crate::error::OptimizerError;
use crate::matrix::MatrixBuilder;
use crate::model::{
    Algorithm, OptimizationMetrics, OptimizationObjective, OptimizationParameters, OptimizationResult,
};
use crate::nearest_neighbor::{construct, result_for};
use crate::route::{RouteContext, is_sequencing_objective};
use crate::traits::RouteOptimizer;

#[derive(Debug, Clone)]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    /// Multiplicative cooling factor applied after each temperature level.
    pub cooling_rate: f64,
    /// The run stops once the temperature drops to this value.
    pub min_temperature: f64,
    pub iterations_per_temperature: usize,
    pub seed: Option<u64>,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 1000.0,
            cooling_rate: 0.995,
            min_temperature: 0.1,
            iterations_per_temperature: 100,
            seed: None,
        }
    }
}

impl AnnealingConfig {
    pub fn with_initial_temperature(mut self, t: f64) -> Self {
        self.initial_temperature = t;
        self
    }

    pub fn with_cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = rate;
        self
    }

    pub fn with_min_temperature(mut self, t: f64) -> Self {
        self.min_temperature = t;
        self
    }

    pub fn with_iterations_per_temperature(mut self, n: usize) -> Self {
        self.iterations_per_temperature = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Swap,
    Reverse,
    Relocate,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedAnnealingOptimizer {
    builder: Arc<MatrixBuilder>,
    config: AnnealingConfig,
}

impl SimulatedAnnealingOptimizer {
    pub fn new(config: AnnealingConfig) -> Self {
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

impl RouteOptimizer for SimulatedAnnealingOptimizer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SimulatedAnnealing
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
        let ctx = RouteContext::new(Algorithm::SimulatedAnnealing, parameters, &self.builder)?;

        let seed = construct(&ctx, cancellation);
        if seed.order.is_empty() {
            return Ok(result_for(&ctx, &seed, started));
        }

        let config = &self.config;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut current = seed.order;
        let mut current_cost = ctx.route_cost(&current);
        let mut best = current.clone();
        let mut best_cost = current_cost;
        let mut metrics = OptimizationMetrics::single_pass(current_cost, seed.evaluations);

        let mut temperature = config.initial_temperature;
        let mut levels = 0usize;
        let mut total_iterations = 0usize;
        let mut accepted = 0usize;
        let mut rejected = 0usize;

        // A single job has no neighbors.
        let cooling_ok = config.cooling_rate > 0.0 && config.cooling_rate < 1.0;
        if current.len() >= 2 && cooling_ok {
            while temperature > config.min_temperature {
                if cancellation.is_cancelled() {
                    break;
                }

                for _ in 0..config.iterations_per_temperature {
                    let neighbor = neighbor(&current, &mut rng);
                    let neighbor_cost = ctx.route_cost(&neighbor);
                    metrics.evaluations += 1;
                    total_iterations += 1;

                    let delta = neighbor_cost - current_cost;
                    let accept = delta < 0.0 || rng.random::<f64>() < (-delta / temperature).exp();

                    if accept {
                        current = neighbor;
                        current_cost = neighbor_cost;
                        accepted += 1;

                        if current_cost < best_cost {
                            best.clone_from(&current);
                            best_cost = current_cost;
                            metrics.cost_history.push(best_cost);
                        }
                    } else {
                        rejected += 1;
                    }
                }

                temperature *= config.cooling_rate;
                levels += 1;
            }
        }

        let acceptance_rate = if total_iterations == 0 {
            0.0
        } else {
            accepted as f64 / total_iterations as f64
        };

        metrics.final_cost = best_cost;
        metrics.set_extra("initial_temperature", config.initial_temperature);
        metrics.set_extra("final_temperature", temperature);
        metrics.set_extra("min_temperature", config.min_temperature);
        metrics.set_extra("cooling_rate", config.cooling_rate);
        metrics.set_extra("temperature_levels", levels as f64);
        metrics.set_extra("accepted_moves", accepted as f64);
        metrics.set_extra("rejected_moves", rejected as f64);
        metrics.set_extra("acceptance_rate", acceptance_rate);

        Ok(ctx.finish(Algorithm::SimulatedAnnealing, &best, started, total_iterations, metrics))
    }
}

/// Random neighbor of `route`, which must hold at least two jobs.
fn neighbor<R: Rng>(route: &[usize], rng: &mut R) -> Vec<usize> {
    let moves = [Move::Swap, Move::Reverse, Move::Relocate];
    let mut next = route.to_vec();
    match moves[rng.random_range(0..moves.len())] {
        Move::Swap => {
            let (i, j) = distinct_pair(next.len(), rng);
            next.swap(i, j);
        }
        Move::Reverse => {
            let n = next.len();
            let max_len = (n / 2).max(2);
            let len = rng.random_range(2..=max_len);
            let start = rng.random_range(0..=n - len);
            next[start..start + len].reverse();
        }
        Move::Relocate => {
            let (from, to) = distinct_pair(next.len(), rng);
            let job = next.remove(from);
            next.insert(to, job);
        }
    }
    next
}

fn distinct_pair<R: Rng>(n: usize, rng: &mut R) -> (usize, usize) {
    let i = rng.random_range(0..n);
    let mut j = rng.random_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    (i, j)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{Coordinate, Job, Technician};

    fn params(n: usize) -> OptimizationParameters {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let jobs = (0..n)
            .map(|i| {
                let angle = i as f64 * 2.399;
                Job::new(format!("j{}", i), date)
                    .with_location(Coordinate::new(36.1 + 0.05 * angle.sin(), -115.1 + 0.05 * angle.cos()))
            })
            .collect();
        OptimizationParameters::new(jobs, Technician::new("tech"), date)
    }

    fn fast() -> AnnealingConfig {
        AnnealingConfig::default()
            .with_cooling_rate(0.9)
            .with_seed(17)
    }

    #[test]
    fn neighbors_are_permutations() {
        let mut rng = StdRng::seed_from_u64(9);
        let route: Vec<usize> = (0..7).collect();
        for _ in 0..200 {
            let mut next = neighbor(&route, &mut rng);
            next.sort_unstable();
            assert_eq!(next, route);
        }
    }

    #[test]
    fn neighbors_of_two_jobs() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..20 {
            assert_eq!(neighbor(&[0, 1], &mut rng), vec![1, 0]);
        }
    }

    #[test]
    fn never_loses_the_seed() {
        let p = params(9);
        let result = SimulatedAnnealingOptimizer::new(fast())
            .optimize(&p, &CancellationToken::new())
            .unwrap();
        assert!(result.metrics.final_cost <= result.metrics.initial_cost);
        assert_eq!(result.metrics.cost_history.first(), Some(&result.metrics.initial_cost));
        assert_eq!(result.metrics.cost_history.last(), Some(&result.metrics.final_cost));
        assert_eq!(result.stops.len(), 9);
    }

    #[test]
    fn reports_schedule_and_acceptance() {
        let p = params(6);
        let result = SimulatedAnnealingOptimizer::new(fast())
            .optimize(&p, &CancellationToken::new())
            .unwrap();
        let extra = &result.metrics.extra;
        let rate = extra["acceptance_rate"];
        assert!((0.0..=1.0).contains(&rate));
        assert_eq!(
            extra["accepted_moves"] + extra["rejected_moves"],
            result.iterations as f64
        );
        assert!(extra["final_temperature"] <= 0.1);
        assert_eq!(extra["initial_temperature"], 1000.0);
        assert_eq!(result.iterations, extra["temperature_levels"] as usize * 100);
    }

    #[test]
    fn single_job_skips_search() {
        let p = params(1);
        let result = SimulatedAnnealingOptimizer::new(fast())
            .optimize(&p, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.stops.len(), 1);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.metrics.extra["acceptance_rate"], 0.0);
    }

    #[test]
    fn cancelled_run_falls_back_to_nearest_neighbor() {
        let p = params(5);
        let result = SimulatedAnnealingOptimizer::new(fast())
            .optimize(&p, &CancellationToken::cancelled())
            .unwrap();
        assert_eq!(result.algorithm, Algorithm::NearestNeighbor);
        assert!(result.stops.is_empty());
    }
}

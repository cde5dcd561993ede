//! Permutation genetic algorithm.
//!
//! # Algorithm
//!
//! 1. Population: the input order plus Fisher-Yates shuffles of it
//! 2. Each generation: copy the elite unchanged, then fill the rest with
//!    children of tournament-selected parents (order crossover, swap mutation)
//! 3. Run a fixed number of generations, keeping the best route ever seen
//!
//! Fitness is `1 / (1 + cost)`. Selection compares costs directly, which is
//! the same ordering and stays correct for the negative costs produced by
//! revenue objectives.
//!
//! # References
//!
//! - Davis (1985), "Applying Adaptive Algorithms to Epistatic Domains" (OX)
//! - Goldberg & Deb (1991), "A Comparative Analysis of Selection Schemes"

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::cancellation::CancellationToken;
use crate::error::OptimizerError;
use crate::matrix::MatrixBuilder;
use crate::model::{
    Algorithm, OptimizationMetrics, OptimizationObjective, OptimizationParameters, OptimizationResult,
};
use crate::route::{RouteContext, is_sequencing_objective};
use crate::traits::RouteOptimizer;

/// Configuration for the genetic optimizer.
///
/// # Examples
///
/// ```
/// use route_sequencer::genetic::GeneticConfig;
///
/// let config = GeneticConfig::default()
///     .with_generations(50)
///     .with_seed(7);
/// assert_eq!(config.population_size, 50);
/// ```
#[derive(Debug, Clone)]
pub struct GeneticConfig {
    pub population_size: usize,
    /// Individuals copied unchanged into the next generation.
    pub elite_size: usize,
    pub crossover_rate: f64,
    /// Probability of one swap mutation per child.
    pub mutation_rate: f64,
    /// Generations to run; there is no early exit on convergence.
    pub generations: usize,
    pub tournament_size: usize,
    /// Random seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            elite_size: 5,
            crossover_rate: 0.8,
            mutation_rate: 0.02,
            generations: 100,
            tournament_size: 3,
            seed: None,
        }
    }
}

impl GeneticConfig {
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_elite_size(mut self, size: usize) -> Self {
        self.elite_size = size;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    pub fn with_tournament_size(mut self, size: usize) -> Self {
        self.tournament_size = size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Fitness reported for a route of the given cost (higher is better).
pub fn fitness(cost: f64) -> f64 {
    1.0 / (1.0 + cost)
}

#[derive(Debug, Clone)]
struct Individual {
    order: Vec<usize>,
    cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GeneticOptimizer {
    builder: Arc<MatrixBuilder>,
    config: GeneticConfig,
}

impl GeneticOptimizer {
    pub fn new(config: GeneticConfig) -> Self {
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

impl RouteOptimizer for GeneticOptimizer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Genetic
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
        let ctx = RouteContext::new(Algorithm::Genetic, parameters, &self.builder)?;
        if ctx.is_empty() {
            return Ok(ctx.empty_result(Algorithm::Genetic, started));
        }

        let config = &self.config;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let population_size = config.population_size.max(1);
        let elite_size = config.elite_size.min(population_size);
        let mut evaluations = 0usize;
        let mut evaluate = |order: Vec<usize>| {
            evaluations += 1;
            let cost = ctx.route_cost(&order);
            Individual { order, cost }
        };

        let mut population = Vec::with_capacity(population_size);
        population.push(evaluate(ctx.identity_order()));
        while population.len() < population_size {
            let mut order = ctx.identity_order();
            order.shuffle(&mut rng);
            population.push(evaluate(order));
        }

        let initial_cost = population[0].cost;
        let mut best = best_of(&population).clone();
        let mut cost_history = vec![initial_cost];
        if best.cost < initial_cost {
            cost_history.push(best.cost);
        }

        let mut generations_completed = 0;
        'generations: for _ in 0..config.generations {
            if cancellation.is_cancelled() {
                break;
            }

            population.sort_by(|a, b| a.cost.total_cmp(&b.cost));
            let mut next: Vec<Individual> = population[..elite_size].to_vec();

            while next.len() < population_size {
                if cancellation.is_cancelled() {
                    break 'generations;
                }

                let parent1 = tournament(&population, config.tournament_size, &mut rng);
                let parent2 = tournament(&population, config.tournament_size, &mut rng);

                let (mut child1, mut child2) = if rng.random::<f64>() < config.crossover_rate {
                    order_crossover(&parent1, &parent2, &mut rng)
                } else {
                    (parent1, parent2)
                };

                if rng.random::<f64>() < config.mutation_rate {
                    swap_mutation(&mut child1, &mut rng);
                }
                if rng.random::<f64>() < config.mutation_rate {
                    swap_mutation(&mut child2, &mut rng);
                }

                next.push(evaluate(child1));
                if next.len() < population_size {
                    next.push(evaluate(child2));
                }
            }

            population = next;
            generations_completed += 1;

            let generation_best = best_of(&population);
            if generation_best.cost < best.cost {
                best = generation_best.clone();
                cost_history.push(best.cost);
            }
        }

        let mut metrics = OptimizationMetrics {
            initial_cost,
            final_cost: best.cost,
            evaluations,
            cost_history,
            ..OptimizationMetrics::default()
        };
        metrics.set_extra("population_size", population_size as f64);
        metrics.set_extra("elite_size", elite_size as f64);
        metrics.set_extra("crossover_rate", config.crossover_rate);
        metrics.set_extra("mutation_rate", config.mutation_rate);
        metrics.set_extra("generations", generations_completed as f64);
        metrics.set_extra("best_fitness", fitness(best.cost));

        Ok(ctx.finish(Algorithm::Genetic, &best.order, started, generations_completed, metrics))
    }
}

fn best_of(population: &[Individual]) -> &Individual {
    population
        .iter()
        .min_by(|a, b| a.cost.total_cmp(&b.cost))
        .unwrap_or(&population[0])
}

/// Pick `size` individuals at random (with replacement) and clone the cheapest.
fn tournament<R: Rng>(population: &[Individual], size: usize, rng: &mut R) -> Vec<usize> {
    let mut winner = &population[rng.random_range(0..population.len())];
    for _ in 1..size.max(1) {
        let challenger = &population[rng.random_range(0..population.len())];
        if challenger.cost < winner.cost {
            winner = challenger;
        }
    }
    winner.order.clone()
}

/// Order crossover (OX).
///
/// Each child keeps a random slice of one parent in place and fills the
/// remaining positions left to right with the other parent's jobs in their
/// relative order.
fn order_crossover<R: Rng>(parent1: &[usize], parent2: &[usize], rng: &mut R) -> (Vec<usize>, Vec<usize>) {
    let n = parent1.len();
    if n < 2 {
        return (parent1.to_vec(), parent2.to_vec());
    }

    let a = rng.random_range(0..n);
    let b = rng.random_range(0..n);
    let (start, end) = if a <= b { (a, b) } else { (b, a) };

    (
        ox_child(parent1, parent2, start, end),
        ox_child(parent2, parent1, start, end),
    )
}

fn ox_child(template: &[usize], donor: &[usize], start: usize, end: usize) -> Vec<usize> {
    let n = template.len();
    let mut child = vec![usize::MAX; n];
    let mut taken = vec![false; n];

    for i in start..=end {
        child[i] = template[i];
        taken[template[i]] = true;
    }

    let mut fill = donor.iter().copied().filter(|gene| !taken[*gene]);
    for (position, slot) in child.iter_mut().enumerate() {
        if (start..=end).contains(&position) {
            continue;
        }
        if let Some(gene) = fill.next() {
            *slot = gene;
        }
    }

    child
}

/// Exchange two distinct random positions.
fn swap_mutation<R: Rng>(order: &mut [usize], rng: &mut R) {
    let n = order.len();
    if n < 2 {
        return;
    }
    let i = rng.random_range(0..n);
    let mut j = rng.random_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    order.swap(i, j);
}

//! Repeated-trial comparison of the optimizer family.
//!
//! Trials run strictly sequentially so wall-clock measurements stay
//! comparable. Memory deltas are best-effort resident-set readings and are
//! never exact.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cancellation::CancellationToken;
use crate::model::{Algorithm, OptimizationParameters};
use crate::traits::RouteOptimizer;

/// Error recorded for a trial interrupted by cancellation.
pub const CANCELLED_TRIAL: &str = "cancelled before completion";

#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Trials per algorithm.
    pub runs: usize,
    /// Pause between trials to dampen shared-system noise.
    pub trial_delay: Duration,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            runs: 5,
            trial_delay: Duration::from_millis(10),
        }
    }
}

impl BenchmarkConfig {
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_trial_delay(mut self, delay: Duration) -> Self {
        self.trial_delay = delay;
        self
    }
}

/// Outcome of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub algorithm: Algorithm,
    pub run: usize,
    pub execution_time: Duration,
    /// Resident memory growth around the call, in bytes.
    pub memory_delta_bytes: i64,
    pub cost: f64,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub iterations: usize,
    pub success: bool,
    pub error: Option<String>,
}

impl BenchmarkResult {
    pub fn execution_ms(&self) -> f64 {
        self.execution_time.as_secs_f64() * 1000.0
    }
}

/// Aggregates over the successful trials of one algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub algorithm: Algorithm,
    pub runs: usize,
    pub successful_runs: usize,
    pub average_cost: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    pub cost_std_dev: f64,
    pub average_time_ms: f64,
    pub min_time_ms: f64,
    pub max_time_ms: f64,
    pub time_std_dev_ms: f64,
    /// Mean cost relative to the best mean cost in the batch (best = 1.0).
    pub relative_cost_to_optimal: f64,
    /// Mean time relative to the fastest mean time in the batch (fastest = 1.0).
    pub relative_speed_to_fastest: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub results: Vec<BenchmarkResult>,
    pub statistics: Vec<AlgorithmStatistics>,
    pub best_algorithm: Option<Algorithm>,
    pub fastest_algorithm: Option<Algorithm>,
}

impl BenchmarkReport {
    pub fn statistics_for(&self, algorithm: Algorithm) -> Option<&AlgorithmStatistics> {
        self.statistics.iter().find(|stats| stats.algorithm == algorithm)
    }

    /// Flat `algorithm.metric -> value` view of the statistics.
    pub fn comparison_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        for stats in &self.statistics {
            let name = stats.algorithm.as_str();
            map.insert(format!("{}.average_cost", name), stats.average_cost);
            map.insert(format!("{}.cost_std_dev", name), stats.cost_std_dev);
            map.insert(format!("{}.average_time_ms", name), stats.average_time_ms);
            map.insert(format!("{}.time_std_dev_ms", name), stats.time_std_dev_ms);
            map.insert(format!("{}.relative_cost", name), stats.relative_cost_to_optimal);
            map.insert(format!("{}.relative_speed", name), stats.relative_speed_to_fastest);
            map.insert(format!("{}.successful_runs", name), stats.successful_runs as f64);
        }
        map
    }

    /// Human-readable table of the statistics.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<20} {:>6} {:>12} {:>10} {:>12} {:>9} {:>9}",
            "algorithm", "runs", "avg cost", "std dev", "avg ms", "rel cost", "rel time"
        );
        for stats in &self.statistics {
            let _ = writeln!(
                out,
                "{:<20} {:>6} {:>12.3} {:>10.3} {:>12.3} {:>9.3} {:>9.3}",
                stats.algorithm.as_str(),
                stats.successful_runs,
                stats.average_cost,
                stats.cost_std_dev,
                stats.average_time_ms,
                stats.relative_cost_to_optimal,
                stats.relative_speed_to_fastest
            );
        }
        if let Some(best) = self.best_algorithm {
            let _ = writeln!(out, "best: {}", best);
        }
        if let Some(fastest) = self.fastest_algorithm {
            let _ = writeln!(out, "fastest: {}", fastest);
        }
        out
    }
}

/// Drives a set of optimizers over the same input.
pub struct BenchmarkHarness {
    optimizers: Vec<Box<dyn RouteOptimizer>>,
    config: BenchmarkConfig,
}

impl BenchmarkHarness {
    pub fn new(optimizers: Vec<Box<dyn RouteOptimizer>>, config: BenchmarkConfig) -> Self {
        Self { optimizers, config }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Runs every optimizer that supports the objective `runs` times.
    ///
    /// Cancellation stops scheduling further trials. A trial interrupted by
    /// it is recorded with `success: false` and left out of the statistics.
    pub fn run(&self, parameters: &OptimizationParameters, cancellation: &CancellationToken) -> BenchmarkReport {
        let mut results = Vec::new();

        'optimizers: for optimizer in &self.optimizers {
            if !optimizer.supports_objective(parameters.objective) {
                debug!(
                    algorithm = optimizer.algorithm().as_str(),
                    objective = %parameters.objective,
                    "skipping optimizer without objective support"
                );
                continue;
            }

            for run in 0..self.config.runs {
                if cancellation.is_cancelled() {
                    break 'optimizers;
                }
                if !results.is_empty() && !self.config.trial_delay.is_zero() {
                    std::thread::sleep(self.config.trial_delay);
                }
                results.push(trial(optimizer.as_ref(), parameters, cancellation, run));
            }
        }

        let report = aggregate(results);
        info!(
            trials = report.results.len(),
            best = ?report.best_algorithm,
            fastest = ?report.fastest_algorithm,
            "benchmark complete"
        );
        report
    }
}

fn trial(
    optimizer: &dyn RouteOptimizer,
    parameters: &OptimizationParameters,
    cancellation: &CancellationToken,
    run: usize,
) -> BenchmarkResult {
    let memory_before = resident_memory_bytes();
    let started = Instant::now();
    let outcome = optimizer.optimize(parameters, cancellation);
    let execution_time = started.elapsed();
    let memory_delta_bytes = match (memory_before, resident_memory_bytes()) {
        (Some(before), Some(after)) => after as i64 - before as i64,
        _ => 0,
    };

    // An interrupted trial never counts as a success.
    let cut_short = cancellation.is_cancelled();

    match outcome {
        Ok(result) => BenchmarkResult {
            algorithm: optimizer.algorithm(),
            run,
            execution_time,
            memory_delta_bytes,
            cost: result.total_cost,
            distance_km: result.total_distance_km,
            duration_minutes: result.total_duration_minutes,
            iterations: result.iterations,
            success: !cut_short,
            error: cut_short.then(|| CANCELLED_TRIAL.to_string()),
        },
        Err(err) => BenchmarkResult {
            algorithm: optimizer.algorithm(),
            run,
            execution_time,
            memory_delta_bytes,
            cost: 0.0,
            distance_km: 0.0,
            duration_minutes: 0.0,
            iterations: 0,
            success: false,
            error: Some(err.to_string()),
        },
    }
}

/// Builds per-algorithm statistics and the normalized comparison.
pub fn aggregate(results: Vec<BenchmarkResult>) -> BenchmarkReport {
    let mut grouped: BTreeMap<Algorithm, Vec<&BenchmarkResult>> = BTreeMap::new();
    for result in &results {
        grouped.entry(result.algorithm).or_default().push(result);
    }

    let mut statistics: Vec<AlgorithmStatistics> = grouped
        .into_iter()
        .filter_map(|(algorithm, trials)| {
            let successful: Vec<&BenchmarkResult> = trials.iter().copied().filter(|t| t.success).collect();
            if successful.is_empty() {
                return None;
            }
            let costs: Vec<f64> = successful.iter().map(|t| t.cost).collect();
            let times: Vec<f64> = successful.iter().map(|t| t.execution_ms()).collect();
            let (average_cost, min_cost, max_cost, cost_std_dev) = describe(&costs);
            let (average_time_ms, min_time_ms, max_time_ms, time_std_dev_ms) = describe(&times);
            Some(AlgorithmStatistics {
                algorithm,
                runs: trials.len(),
                successful_runs: successful.len(),
                average_cost,
                min_cost,
                max_cost,
                cost_std_dev,
                average_time_ms,
                min_time_ms,
                max_time_ms,
                time_std_dev_ms,
                relative_cost_to_optimal: 1.0,
                relative_speed_to_fastest: 1.0,
            })
        })
        .collect();

    let best = statistics
        .iter()
        .min_by(|a, b| a.average_cost.total_cmp(&b.average_cost))
        .map(|stats| (stats.algorithm, stats.average_cost));
    let fastest = statistics
        .iter()
        .min_by(|a, b| a.average_time_ms.total_cmp(&b.average_time_ms))
        .map(|stats| (stats.algorithm, stats.average_time_ms));

    for stats in &mut statistics {
        if let Some((_, anchor)) = best {
            stats.relative_cost_to_optimal = relative_to(stats.average_cost, anchor);
        }
        if let Some((_, anchor)) = fastest {
            stats.relative_speed_to_fastest = relative_to(stats.average_time_ms, anchor);
        }
    }

    BenchmarkReport {
        results,
        statistics,
        best_algorithm: best.map(|(algorithm, _)| algorithm),
        fastest_algorithm: fastest.map(|(algorithm, _)| algorithm),
    }
}

/// Mean, min, max and population standard deviation.
fn describe(values: &[f64]) -> (f64, f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, min, max, variance.sqrt())
}

/// Ratio of `value` to the best `anchor`; the anchor itself maps to 1.0.
///
/// For non-positive anchors (revenue objectives) the gap is scaled by the
/// anchor's magnitude so that worse values still map above 1.0.
fn relative_to(value: f64, anchor: f64) -> f64 {
    if anchor > f64::EPSILON {
        value / anchor
    } else if anchor < -f64::EPSILON {
        1.0 + (value - anchor) / anchor.abs()
    } else {
        1.0 + (value - anchor)
    }
}

/// Current resident set size, where the platform exposes it.
fn resident_memory_bytes() -> Option<u64> {
    const PAGE_SIZE: u64 = 4096;
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial_result(algorithm: Algorithm, cost: f64, ms: u64) -> BenchmarkResult {
        BenchmarkResult {
            algorithm,
            run: 0,
            execution_time: Duration::from_millis(ms),
            memory_delta_bytes: 0,
            cost,
            distance_km: cost,
            duration_minutes: 0.0,
            iterations: 1,
            success: true,
            error: None,
        }
    }

    /// Nearest neighbor that cancels the shared token on its `cancel_on`-th call.
    struct CancellingOptimizer {
        calls: std::sync::atomic::AtomicUsize,
        cancel_on: usize,
        trigger: CancellationToken,
    }

    impl RouteOptimizer for CancellingOptimizer {
        fn algorithm(&self) -> Algorithm {
            Algorithm::TwoOpt
        }

        fn supports_objective(&self, _objective: crate::model::OptimizationObjective) -> bool {
            true
        }

        fn optimize(
            &self,
            parameters: &OptimizationParameters,
            cancellation: &CancellationToken,
        ) -> Result<crate::model::OptimizationResult, crate::error::OptimizerError> {
            let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if call == self.cancel_on {
                self.trigger.cancel();
            }
            crate::nearest_neighbor::NearestNeighborOptimizer::new().optimize(parameters, cancellation)
        }
    }

    #[test]
    fn trial_cut_short_by_cancellation_is_not_a_success() {
        use chrono::NaiveDate;

        use crate::model::{Coordinate, Job, Technician};

        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let jobs = (0..4)
            .map(|i| Job::new(format!("j{}", i), date).with_location(Coordinate::new(36.0 + 0.01 * i as f64, -115.0)))
            .collect();
        let parameters = OptimizationParameters::new(jobs, Technician::new("t"), date);

        let cancel = CancellationToken::new();
        let optimizer = CancellingOptimizer {
            calls: Default::default(),
            cancel_on: 2,
            trigger: cancel.clone(),
        };
        let harness = BenchmarkHarness::new(
            vec![Box::new(optimizer)],
            BenchmarkConfig::default().with_runs(5).with_trial_delay(Duration::ZERO),
        );
        let report = harness.run(&parameters, &cancel);

        // The first trial completes, the second is interrupted, no third starts.
        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].success);
        assert!(!report.results[1].success);
        assert_eq!(report.results[1].error.as_deref(), Some(CANCELLED_TRIAL));

        let stats = report.statistics_for(Algorithm::TwoOpt).unwrap();
        assert_eq!(stats.successful_runs, 1);
        assert_eq!(stats.average_cost, report.results[0].cost);
    }

    #[test]
    fn describe_values() {
        let (mean, min, max, std) = describe(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(min, 2.0);
        assert_eq!(max, 9.0);
        assert_eq!(std, 2.0);
    }

    #[test]
    fn normalizes_against_best_and_fastest() {
        let report = aggregate(vec![
            trial_result(Algorithm::NearestNeighbor, 120.0, 1),
            trial_result(Algorithm::NearestNeighbor, 120.0, 1),
            trial_result(Algorithm::Genetic, 100.0, 40),
            trial_result(Algorithm::Genetic, 100.0, 60),
        ]);

        assert_eq!(report.best_algorithm, Some(Algorithm::Genetic));
        assert_eq!(report.fastest_algorithm, Some(Algorithm::NearestNeighbor));

        let nn = report.statistics_for(Algorithm::NearestNeighbor).unwrap();
        let ga = report.statistics_for(Algorithm::Genetic).unwrap();
        assert_eq!(ga.relative_cost_to_optimal, 1.0);
        assert!((nn.relative_cost_to_optimal - 1.2).abs() < 1e-9);
        assert_eq!(nn.relative_speed_to_fastest, 1.0);
        assert!((ga.relative_speed_to_fastest - 50.0).abs() < 1e-6);
        assert!((ga.time_std_dev_ms - 10.0).abs() < 1e-6);
    }

    #[test]
    fn failed_trials_are_excluded_from_statistics() {
        let mut failed = trial_result(Algorithm::TwoOpt, 0.0, 1);
        failed.success = false;
        failed.error = Some("boom".to_string());

        let report = aggregate(vec![failed, trial_result(Algorithm::Genetic, 10.0, 5)]);
        assert!(report.statistics_for(Algorithm::TwoOpt).is_none());
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.best_algorithm, Some(Algorithm::Genetic));
    }

    #[test]
    fn negative_costs_keep_best_at_one() {
        assert_eq!(relative_to(-200.0, -200.0), 1.0);
        assert!(relative_to(-100.0, -200.0) > 1.0);
        assert_eq!(relative_to(0.0, 0.0), 1.0);
    }

    #[test]
    fn summary_and_map_name_algorithms() {
        let report = aggregate(vec![trial_result(Algorithm::TwoOpt, 10.0, 5)]);
        assert!(report.summary().contains("two-opt"));
        assert_eq!(report.comparison_map().get("two-opt.average_cost"), Some(&10.0));
    }

    #[test]
    fn empty_report() {
        let report = aggregate(Vec::new());
        assert!(report.statistics.is_empty());
        assert!(report.best_algorithm.is_none());
    }
}

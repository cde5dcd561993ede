//! Shared machinery for every optimizer: job filtering, matrix resolution,
//! the objective cost function and timeline construction.
//!
//! Routes are permutations of indices into [`RouteContext::jobs`].

use std::time::Instant;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::debug;

use crate::constraints::{ConstraintValidator, penalty_of};
use crate::error::OptimizerError;
use crate::matrix::{DistanceMatrix, MatrixBuilder};
use crate::model::{
    Algorithm, Coordinate, Job, OptimizationMetrics, OptimizationObjective, OptimizationParameters,
    OptimizationResult, OptimizedStop,
};
use crate::traits::Leg;

/// Cost per kilometer driven.
pub const COST_PER_KM: f64 = 0.50;

/// Cost per hour spent travelling.
pub const COST_PER_TRAVEL_HOUR: f64 = 25.0;

/// Share of revenue credited per visit under [`OptimizationObjective::MinimizeCost`].
pub const REVENUE_CREDIT: f64 = 0.10;

/// Distance assigned to any leg touching an unlocatable job.
pub const UNLOCATABLE_DISTANCE_KM: f64 = 20_000.0;

pub const NO_JOBS_MESSAGE: &str = "no jobs to optimize";
pub const NO_SKILLED_JOBS_MESSAGE: &str = "no valid jobs for technician skills";

/// Travel-relevant cost of one leg under `objective`.
///
/// `revenue` is the revenue of the job at the end of the leg.
pub fn leg_cost(objective: OptimizationObjective, leg: Leg, revenue: f64) -> f64 {
    let travel = leg.distance_km * COST_PER_KM + leg.travel_hours() * COST_PER_TRAVEL_HOUR;
    match objective {
        OptimizationObjective::MinimizeDistance => leg.distance_km,
        OptimizationObjective::MinimizeTime => leg.travel_minutes(),
        OptimizationObjective::MinimizeCost => travel - revenue * REVENUE_CREDIT,
        OptimizationObjective::MaximizeRevenue => -(revenue - travel),
        // Rejected before a context exists.
        OptimizationObjective::BalanceWorkload => leg.distance_km,
    }
}

/// True for objectives every optimizer in this crate implements.
pub fn is_sequencing_objective(objective: OptimizationObjective) -> bool {
    !matches!(objective, OptimizationObjective::BalanceWorkload)
}

/// Resolved view of one optimization call.
///
/// Nodes are laid out as `0 = start`, `1..=n` = jobs, `n + 1` = end (when an
/// end location is set); every leg between nodes is resolved up front.
pub struct RouteContext<'a> {
    pub parameters: &'a OptimizationParameters,
    pub jobs: Vec<&'a Job>,
    /// Messages about jobs dropped before sequencing.
    pub dropped: Vec<String>,
    legs: Vec<Leg>,
    nodes: usize,
    has_end: bool,
    day_start: NaiveDateTime,
}

impl<'a> RouteContext<'a> {
    pub fn new(
        algorithm: Algorithm,
        parameters: &'a OptimizationParameters,
        builder: &MatrixBuilder,
    ) -> Result<Self, OptimizerError> {
        if !is_sequencing_objective(parameters.objective) {
            return Err(OptimizerError::UnsupportedObjective {
                algorithm,
                objective: parameters.objective,
            });
        }

        let technician = &parameters.technician;
        let mut jobs = Vec::with_capacity(parameters.jobs.len());
        let mut dropped = Vec::new();
        for job in &parameters.jobs {
            if parameters.validate_skills && !technician.can_perform(job) {
                dropped.push(format!(
                    "job {} skipped: technician {} lacks {}",
                    job.id,
                    technician.id,
                    technician.missing_skills(job).join(", ")
                ));
                continue;
            }
            jobs.push(job);
        }

        let start = parameters
            .start_location
            .or_else(|| jobs.first().and_then(|job| job.location));
        let end = parameters.end_location;

        let mut waypoints: Vec<Option<Coordinate>> = Vec::with_capacity(jobs.len() + 2);
        waypoints.push(start);
        waypoints.extend(jobs.iter().map(|job| job.location));
        if end.is_some() {
            waypoints.push(end);
        }

        let legs = match &parameters.distance_matrix {
            Some(matrix) => resolve_legs(&waypoints, matrix, builder),
            None if jobs.is_empty() => Vec::new(),
            None => {
                let located: Vec<Coordinate> = waypoints.iter().flatten().copied().collect();
                resolve_legs(&waypoints, &builder.build(&located), builder)
            }
        };

        let date = parameters.time_window.date();
        let day_start = date.and_time(technician.day_start(date));

        Ok(Self {
            parameters,
            nodes: waypoints.len(),
            jobs,
            dropped,
            legs,
            has_end: end.is_some(),
            day_start,
        })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn objective(&self) -> OptimizationObjective {
        self.parameters.objective
    }

    /// The unmodified input order.
    pub fn identity_order(&self) -> Vec<usize> {
        (0..self.jobs.len()).collect()
    }

    fn leg(&self, from: usize, to: usize) -> Leg {
        self.legs
            .get(from * self.nodes + to)
            .copied()
            .unwrap_or(Leg::ZERO)
    }

    fn job_node(job: usize) -> usize {
        job + 1
    }

    /// Leg from the start location to `job`.
    pub fn leg_from_start(&self, job: usize) -> Leg {
        self.leg(0, Self::job_node(job))
    }

    /// Leg between two jobs.
    pub fn leg_between(&self, from: usize, to: usize) -> Leg {
        self.leg(Self::job_node(from), Self::job_node(to))
    }

    /// Return leg from `job` to the end location, if one is set.
    pub fn leg_to_end(&self, job: usize) -> Option<Leg> {
        self.has_end
            .then(|| self.leg(Self::job_node(job), self.nodes - 1))
    }

    /// Cost of arriving at `to` from `from` (`None` = the start location).
    pub fn step_cost(&self, from: Option<usize>, to: usize) -> f64 {
        let leg = match from {
            Some(from) => self.leg_between(from, to),
            None => self.leg_from_start(to),
        };
        leg_cost(self.objective(), leg, self.jobs[to].estimated_revenue)
    }

    /// Objective value of visiting jobs in `order`.
    pub fn route_cost(&self, order: &[usize]) -> f64 {
        let Some((&first, _)) = order.split_first() else {
            return 0.0;
        };

        let mut cost = self.step_cost(None, first);
        for pair in order.windows(2) {
            cost += self.step_cost(Some(pair[0]), pair[1]);
        }
        if let Some(&last) = order.last() {
            if let Some(leg) = self.leg_to_end(last) {
                cost += leg_cost(self.objective(), leg, 0.0);
            }
        }
        cost
    }

    /// Walks `order` from the start of the working day and annotates each stop.
    pub fn build_stops(&self, order: &[usize]) -> Vec<OptimizedStop> {
        let mut stops = Vec::with_capacity(order.len());
        let mut clock = self.day_start;
        let mut previous: Option<usize> = None;

        for (position, &job_index) in order.iter().enumerate() {
            let job = self.jobs[job_index];
            let leg = match previous {
                Some(prev) => self.leg_between(prev, job_index),
                None => self.leg_from_start(job_index),
            };

            let arrival = clock + TimeDelta::seconds(leg.duration_seconds);
            let departure = arrival + TimeDelta::minutes(job.estimated_duration_minutes);
            let violations = ConstraintValidator::validate_stop(job, arrival, departure, self.parameters)
                .into_iter()
                .map(|violation| violation.message)
                .collect();

            stops.push(OptimizedStop {
                job: job.clone(),
                sequence: position + 1,
                distance_from_previous_km: leg.distance_km,
                travel_seconds_from_previous: leg.duration_seconds,
                estimated_arrival: arrival,
                estimated_departure: departure,
                violations,
            });

            clock = departure;
            previous = Some(job_index);
        }

        stops
    }

    /// Assembles the final result for `order`.
    pub fn finish(
        &self,
        algorithm: Algorithm,
        order: &[usize],
        started: Instant,
        iterations: usize,
        mut metrics: OptimizationMetrics,
    ) -> OptimizationResult {
        let stops = self.build_stops(order);

        let mut total_distance_km: f64 = stops.iter().map(|s| s.distance_from_previous_km).sum();
        let mut travel_seconds: i64 = stops.iter().map(|s| s.travel_seconds_from_previous).sum();
        if let Some(leg) = order.last().and_then(|&last| self.leg_to_end(last)) {
            total_distance_km += leg.distance_km;
            travel_seconds += leg.duration_seconds;
        }
        let service_minutes: i64 = stops.iter().map(|s| s.job.estimated_duration_minutes).sum();
        let total_duration_minutes = travel_seconds as f64 / 60.0 + service_minutes as f64;

        let validation = ConstraintValidator::validate_route(&stops, self.parameters);
        let mut violations = self.dropped.clone();
        violations.extend(validation.messages());

        metrics.set_extra("constraint_penalty", penalty_of(&validation.violations));
        metrics.set_extra(
            "labor_cost",
            total_duration_minutes / 60.0 * self.parameters.technician.hourly_rate,
        );

        debug!(
            algorithm = algorithm.as_str(),
            stops = stops.len(),
            cost = metrics.final_cost,
            distance_km = total_distance_km,
            "route sequenced"
        );

        OptimizationResult {
            stops,
            total_distance_km,
            total_duration_minutes,
            total_cost: self.route_cost(order),
            algorithm,
            optimization_time: started.elapsed(),
            iterations,
            evaluations: metrics.evaluations,
            is_optimal: false,
            violations,
            metrics,
        }
    }

    /// Result for a call with nothing to sequence.
    pub fn empty_result(&self, algorithm: Algorithm, started: Instant) -> OptimizationResult {
        let mut violations = self.dropped.clone();
        violations.push(if self.parameters.jobs.is_empty() {
            NO_JOBS_MESSAGE.to_string()
        } else {
            NO_SKILLED_JOBS_MESSAGE.to_string()
        });

        OptimizationResult {
            stops: Vec::new(),
            total_distance_km: 0.0,
            total_duration_minutes: 0.0,
            total_cost: 0.0,
            algorithm,
            optimization_time: started.elapsed(),
            iterations: 0,
            evaluations: 0,
            is_optimal: false,
            violations,
            metrics: OptimizationMetrics::single_pass(0.0, 0),
        }
    }
}

/// Resolves the full node-to-node leg table against `matrix`.
///
/// Locations missing from the matrix get a great-circle estimate; legs
/// touching an unlocatable node get [`UNLOCATABLE_DISTANCE_KM`].
fn resolve_legs(waypoints: &[Option<Coordinate>], matrix: &DistanceMatrix, builder: &MatrixBuilder) -> Vec<Leg> {
    let n = waypoints.len();
    let indices: Vec<Option<usize>> = waypoints
        .iter()
        .map(|waypoint| waypoint.and_then(|location| matrix.index_of(&location)))
        .collect();

    let unlocatable = builder.estimated_leg_for_distance(UNLOCATABLE_DISTANCE_KM);
    let mut legs = vec![Leg::ZERO; n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let from_matrix = match (indices[i], indices[j]) {
                (Some(a), Some(b)) => matrix.leg(a, b),
                _ => None,
            };
            legs[i * n + j] = match (from_matrix, waypoints[i], waypoints[j]) {
                (Some(leg), _, _) => leg,
                (None, Some(from), Some(to)) => builder.estimated_leg(from, to),
                _ => unlocatable,
            };
        }
    }
    legs
}

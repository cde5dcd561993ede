//! Plain in-memory records consumed and produced by the engine.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

use crate::haversine::haversine_km;
use crate::matrix::DistanceMatrix;

/// Default start of the working day when a technician has no hours on record.
pub const DEFAULT_DAY_START_HOUR: u32 = 8;

/// A point on the globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(*self, *other)
    }

    /// Identity of the coordinate at micro-degree precision.
    pub(crate) fn key(&self) -> (i64, i64) {
        (
            (self.latitude * 1e6).round() as i64,
            (self.longitude * 1e6).round() as i64,
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// A single unit of service work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// `None` marks the job as unlocatable.
    pub location: Option<Coordinate>,
    /// Formatted street address, used to detect visits to the same place.
    pub address: Option<String>,
    pub required_skills: Vec<String>,
    pub estimated_duration_minutes: i64,
    pub estimated_revenue: f64,
    pub scheduled_date: NaiveDate,
    /// Start of a two-hour preferred arrival window.
    pub preferred_time: Option<NaiveTime>,
}

impl Job {
    pub fn new(id: impl Into<String>, scheduled_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            location: None,
            address: None,
            required_skills: Vec::new(),
            estimated_duration_minutes: 60,
            estimated_revenue: 0.0,
            scheduled_date,
            preferred_time: None,
        }
    }

    pub fn with_location(mut self, location: Coordinate) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.required_skills.push(skill.into());
        self
    }

    pub fn with_duration_minutes(mut self, minutes: i64) -> Self {
        self.estimated_duration_minutes = minutes;
        self
    }

    pub fn with_revenue(mut self, revenue: f64) -> Self {
        self.estimated_revenue = revenue;
        self
    }

    pub fn with_preferred_time(mut self, time: NaiveTime) -> Self {
        self.preferred_time = Some(time);
        self
    }

    /// Key used to group stops at the same place: the formatted address, or
    /// the coordinate when no address is known.
    pub fn address_key(&self) -> Option<String> {
        match (&self.address, self.location) {
            (Some(address), _) => Some(address.trim().to_lowercase()),
            (None, Some(location)) => Some(location.to_string()),
            (None, None) => None,
        }
    }
}

/// Working hours for one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingHours {
    pub fn new(day: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self { day, start, end }
    }
}

/// The mobile worker whose day is being sequenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technician {
    pub id: String,
    pub skills: Vec<String>,
    pub working_hours: Vec<WorkingHours>,
    pub hourly_rate: f64,
}

impl Technician {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            skills: Vec::new(),
            working_hours: Vec::new(),
            hourly_rate: 0.0,
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    pub fn with_hours(mut self, day: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        self.working_hours.retain(|hours| hours.day != day);
        self.working_hours.push(WorkingHours::new(day, start, end));
        self
    }

    pub fn with_hourly_rate(mut self, rate: f64) -> Self {
        self.hourly_rate = rate;
        self
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills
            .iter()
            .any(|own| own.trim().eq_ignore_ascii_case(skill.trim()))
    }

    /// Skills the job requires that this technician lacks.
    pub fn missing_skills(&self, job: &Job) -> Vec<String> {
        job.required_skills
            .iter()
            .filter(|skill| !self.has_skill(skill))
            .cloned()
            .collect()
    }

    pub fn can_perform(&self, job: &Job) -> bool {
        job.required_skills.iter().all(|skill| self.has_skill(skill))
    }

    pub fn hours_for(&self, day: Weekday) -> Option<&WorkingHours> {
        self.working_hours.iter().find(|hours| hours.day == day)
    }

    /// Time the technician starts work on `date`.
    pub fn day_start(&self, date: NaiveDate) -> NaiveTime {
        self.hours_for(date.weekday())
            .or_else(|| self.working_hours.first())
            .map(|hours| hours.start)
            .unwrap_or_else(default_day_start)
    }
}

pub(crate) fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_DAY_START_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// The work day being planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// The whole calendar day of `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        Self {
            start,
            end: start + TimeDelta::days(1),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizationObjective {
    MinimizeDistance,
    MinimizeTime,
    MinimizeCost,
    MaximizeRevenue,
    BalanceWorkload,
}

impl fmt::Display for OptimizationObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MinimizeDistance => "minimize-distance",
            Self::MinimizeTime => "minimize-time",
            Self::MinimizeCost => "minimize-cost",
            Self::MaximizeRevenue => "maximize-revenue",
            Self::BalanceWorkload => "balance-workload",
        };
        f.write_str(name)
    }
}

/// Identifier of one optimizer in the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    NearestNeighbor,
    TwoOpt,
    Genetic,
    SimulatedAnnealing,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::NearestNeighbor,
        Algorithm::TwoOpt,
        Algorithm::Genetic,
        Algorithm::SimulatedAnnealing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::NearestNeighbor => "nearest-neighbor",
            Algorithm::TwoOpt => "two-opt",
            Algorithm::Genetic => "genetic",
            Algorithm::SimulatedAnnealing => "simulated-annealing",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one optimization call needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationParameters {
    pub jobs: Vec<Job>,
    pub technician: Technician,
    /// Defaults to the first job's location.
    pub start_location: Option<Coordinate>,
    /// When absent the route ends at its last stop.
    pub end_location: Option<Coordinate>,
    pub time_window: TimeWindow,
    pub objective: OptimizationObjective,
    pub validate_skills: bool,
    pub respect_time_windows: bool,
    /// Advisory constraint names, carried through unscored.
    pub constraints: Vec<String>,
    pub distance_matrix: Option<DistanceMatrix>,
}

impl OptimizationParameters {
    pub fn new(jobs: Vec<Job>, technician: Technician, date: NaiveDate) -> Self {
        Self {
            jobs,
            technician,
            start_location: None,
            end_location: None,
            time_window: TimeWindow::for_date(date),
            objective: OptimizationObjective::MinimizeDistance,
            validate_skills: false,
            respect_time_windows: false,
            constraints: Vec::new(),
            distance_matrix: None,
        }
    }

    pub fn with_start(mut self, start: Coordinate) -> Self {
        self.start_location = Some(start);
        self
    }

    pub fn with_end(mut self, end: Coordinate) -> Self {
        self.end_location = Some(end);
        self
    }

    pub fn with_objective(mut self, objective: OptimizationObjective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_skill_validation(mut self, enabled: bool) -> Self {
        self.validate_skills = enabled;
        self
    }

    pub fn with_time_windows(mut self, enabled: bool) -> Self {
        self.respect_time_windows = enabled;
        self
    }

    pub fn with_distance_matrix(mut self, matrix: DistanceMatrix) -> Self {
        self.distance_matrix = Some(matrix);
        self
    }
}

/// One placed job in the output sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedStop {
    pub job: Job,
    /// 1-based position in the route.
    pub sequence: usize,
    pub distance_from_previous_km: f64,
    pub travel_seconds_from_previous: i64,
    pub estimated_arrival: NaiveDateTime,
    pub estimated_departure: NaiveDateTime,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    pub initial_cost: f64,
    pub final_cost: f64,
    pub evaluations: usize,
    /// Improving costs in order; starts at `initial_cost`, ends at `final_cost`.
    pub cost_history: Vec<f64>,
    pub extra: BTreeMap<String, f64>,
}

impl OptimizationMetrics {
    /// Metrics for an algorithm without an improvement phase.
    pub fn single_pass(cost: f64, evaluations: usize) -> Self {
        Self {
            initial_cost: cost,
            final_cost: cost,
            evaluations,
            cost_history: vec![cost],
            extra: BTreeMap::new(),
        }
    }

    pub fn improvement_percentage(&self) -> f64 {
        if self.initial_cost == 0.0 {
            return 0.0;
        }
        (self.initial_cost - self.final_cost) / self.initial_cost * 100.0
    }

    pub(crate) fn set_extra(&mut self, name: &str, value: f64) {
        self.extra.insert(name.to_string(), value);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub stops: Vec<OptimizedStop>,
    pub total_distance_km: f64,
    /// Travel plus service time.
    pub total_duration_minutes: f64,
    /// Objective value of the returned order.
    pub total_cost: f64,
    pub algorithm: Algorithm,
    pub optimization_time: Duration,
    pub iterations: usize,
    pub evaluations: usize,
    /// Always false: every algorithm here is a heuristic.
    pub is_optimal: bool,
    pub violations: Vec<String>,
    pub metrics: OptimizationMetrics,
}

impl OptimizationResult {
    pub fn job_ids(&self) -> Vec<&str> {
        self.stops.iter().map(|stop| stop.job.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

//! Soft-constraint checks for a proposed visiting order.
//!
//! Every check is advisory: violations annotate stops and feed a scalar
//! penalty, but never remove a stop from the route.

use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::model::{Job, OptimizationParameters, OptimizedStop};

/// Length of a preferred arrival window.
pub const PREFERRED_WINDOW_HOURS: i64 = 2;

/// Longest shift a technician may be scheduled for.
pub const MAX_SHIFT_HOURS: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    Skills,
    WrongDate,
    WorkingHours,
    TimeWindow,
    Overlap,
    ShiftLength,
}

impl ViolationKind {
    /// Fixed penalty weight for one violation of this kind.
    pub fn penalty(self) -> f64 {
        match self {
            ViolationKind::Skills => 200.0,
            ViolationKind::WrongDate => 500.0,
            ViolationKind::WorkingHours => 100.0,
            ViolationKind::TimeWindow => 50.0,
            ViolationKind::Overlap | ViolationKind::ShiftLength => 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Job the violation belongs to; `None` for route-wide violations.
    pub job_id: Option<String>,
    pub message: String,
}

impl Violation {
    fn for_job(kind: ViolationKind, job: &Job, message: String) -> Self {
        Self {
            kind,
            job_id: Some(job.id.clone()),
            message,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteValidation {
    pub violations: Vec<Violation>,
    pub penalty: f64,
    pub is_valid: bool,
}

impl RouteValidation {
    fn from_violations(violations: Vec<Violation>) -> Self {
        let penalty = penalty_of(&violations);
        Self {
            is_valid: violations.is_empty(),
            violations,
            penalty,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.message.clone()).collect()
    }
}

/// Sum of the penalty weights of `violations`.
pub fn penalty_of(violations: &[Violation]) -> f64 {
    violations.iter().map(|v| v.kind.penalty()).sum()
}

pub struct ConstraintValidator;

impl ConstraintValidator {
    /// Checks one stop against skills, its preferred window and working hours.
    pub fn validate_stop(
        job: &Job,
        arrival: NaiveDateTime,
        departure: NaiveDateTime,
        parameters: &OptimizationParameters,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();
        let technician = &parameters.technician;

        if parameters.validate_skills {
            let missing = technician.missing_skills(job);
            if !missing.is_empty() {
                violations.push(Violation::for_job(
                    ViolationKind::Skills,
                    job,
                    format!(
                        "job {}: technician {} lacks required skills: {}",
                        job.id,
                        technician.id,
                        missing.join(", ")
                    ),
                ));
            }
        }

        if parameters.respect_time_windows {
            if let Some(preferred) = job.preferred_time {
                let window_start = arrival.date().and_time(preferred);
                let window_end = window_start + TimeDelta::hours(PREFERRED_WINDOW_HOURS);
                if arrival < window_start || arrival > window_end {
                    violations.push(Violation::for_job(
                        ViolationKind::TimeWindow,
                        job,
                        format!(
                            "job {}: arrival {} outside preferred window {} - {}",
                            job.id, arrival, window_start, window_end
                        ),
                    ));
                }
            }
        }

        match technician.hours_for(arrival.weekday()) {
            Some(hours) => {
                let within = arrival.time() >= hours.start
                    && departure.date() == arrival.date()
                    && departure.time() <= hours.end;
                if !within {
                    violations.push(Violation::for_job(
                        ViolationKind::WorkingHours,
                        job,
                        format!(
                            "job {}: visit {} - {} outside working hours {} - {} on {}",
                            job.id,
                            arrival,
                            departure,
                            hours.start,
                            hours.end,
                            arrival.weekday()
                        ),
                    ));
                }
            }
            None => {
                violations.push(Violation::for_job(
                    ViolationKind::WorkingHours,
                    job,
                    format!(
                        "job {}: technician {} has no working hours on {}",
                        job.id,
                        technician.id,
                        arrival.weekday()
                    ),
                ));
            }
        }

        violations
    }

    /// Checks a whole route: every stop plus date, overlap and shift-length rules.
    pub fn validate_route(stops: &[OptimizedStop], parameters: &OptimizationParameters) -> RouteValidation {
        let mut violations = Vec::new();

        for stop in stops {
            violations.extend(Self::validate_stop(
                &stop.job,
                stop.estimated_arrival,
                stop.estimated_departure,
                parameters,
            ));

            if stop.estimated_arrival.date() != stop.job.scheduled_date {
                violations.push(Violation::for_job(
                    ViolationKind::WrongDate,
                    &stop.job,
                    format!(
                        "job {}: arrival on {} but scheduled for {}",
                        stop.job.id,
                        stop.estimated_arrival.date(),
                        stop.job.scheduled_date
                    ),
                ));
            }
        }

        violations.extend(overlap_violations(stops));

        if let (Some(first), Some(last)) = (stops.first(), stops.last()) {
            let shift = last.estimated_departure - first.estimated_arrival;
            if shift > TimeDelta::hours(MAX_SHIFT_HOURS) {
                violations.push(Violation {
                    kind: ViolationKind::ShiftLength,
                    job_id: None,
                    message: format!(
                        "shift of {} minutes exceeds the {} hour limit",
                        shift.num_minutes(),
                        MAX_SHIFT_HOURS
                    ),
                });
            }
        }

        RouteValidation::from_violations(violations)
    }
}

fn overlap_violations(stops: &[OptimizedStop]) -> Vec<Violation> {
    let mut by_address: HashMap<String, Vec<&OptimizedStop>> = HashMap::new();
    for stop in stops {
        if let Some(key) = stop.job.address_key() {
            by_address.entry(key).or_default().push(stop);
        }
    }

    let mut violations = Vec::new();
    for stop in stops {
        let Some(key) = stop.job.address_key() else {
            continue;
        };
        let Some(group) = by_address.get(&key) else {
            continue;
        };
        for other in group {
            // Report each pair once, from the earlier stop
            if other.sequence <= stop.sequence {
                continue;
            }
            let overlaps = stop.estimated_arrival < other.estimated_departure
                && other.estimated_arrival < stop.estimated_departure;
            if overlaps {
                violations.push(Violation::for_job(
                    ViolationKind::Overlap,
                    &stop.job,
                    format!(
                        "jobs {} and {} overlap at the same address",
                        stop.job.id, other.job.id
                    ),
                ));
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Weekday};

    use super::*;
    use crate::model::{Coordinate, Technician};

    fn date() -> NaiveDate {
        // Monday
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        date().and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }

    fn technician() -> Technician {
        Technician::new("tech")
            .with_skill("Electrical")
            .with_hours(
                Weekday::Mon,
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            )
    }

    fn params(jobs: Vec<Job>) -> OptimizationParameters {
        OptimizationParameters::new(jobs, technician(), date())
            .with_skill_validation(true)
            .with_time_windows(true)
    }

    fn stop(job: Job, sequence: usize, arrival: NaiveDateTime, departure: NaiveDateTime) -> OptimizedStop {
        OptimizedStop {
            job,
            sequence,
            distance_from_previous_km: 0.0,
            travel_seconds_from_previous: 0,
            estimated_arrival: arrival,
            estimated_departure: departure,
            violations: Vec::new(),
        }
    }

    #[test]
    fn clean_stop_has_no_violations() {
        let job = Job::new("j1", date()).with_skill("electrical");
        let p = params(vec![job.clone()]);
        assert!(ConstraintValidator::validate_stop(&job, at(9, 0), at(10, 0), &p).is_empty());
    }

    #[test]
    fn missing_skill_is_reported() {
        let job = Job::new("j1", date()).with_skill("Plumbing");
        let p = params(vec![job.clone()]);
        let violations = ConstraintValidator::validate_stop(&job, at(9, 0), at(10, 0), &p);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Skills);
        assert!(violations[0].message.contains("Plumbing"));
    }

    #[test]
    fn skills_ignored_when_validation_disabled() {
        let job = Job::new("j1", date()).with_skill("Plumbing");
        let p = params(vec![job.clone()]).with_skill_validation(false);
        assert!(ConstraintValidator::validate_stop(&job, at(9, 0), at(10, 0), &p).is_empty());
    }

    #[test]
    fn arrival_outside_preferred_window() {
        let job = Job::new("j1", date()).with_preferred_time(NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        let p = params(vec![job.clone()]);

        let late = ConstraintValidator::validate_stop(&job, at(15, 30), at(16, 0), &p);
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].kind, ViolationKind::TimeWindow);

        let inside = ConstraintValidator::validate_stop(&job, at(14, 45), at(15, 30), &p);
        assert!(inside.is_empty());
    }

    #[test]
    fn visit_past_end_of_day() {
        let job = Job::new("j1", date());
        let p = params(vec![job.clone()]);
        let violations = ConstraintValidator::validate_stop(&job, at(16, 30), at(17, 30), &p);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::WorkingHours);
    }

    #[test]
    fn no_hours_on_weekday() {
        let job = Job::new("j1", date());
        let p = params(vec![job.clone()]);
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 3)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        let violations =
            ConstraintValidator::validate_stop(&job, sunday, sunday + TimeDelta::hours(1), &p);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::WorkingHours));
    }

    #[test]
    fn route_detects_wrong_date_overlap_and_shift() {
        let other_day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let place = Coordinate::new(36.1, -115.1);
        let a = Job::new("a", date()).with_location(place);
        let b = Job::new("b", date()).with_location(place);
        let c = Job::new("c", other_day);

        let stops = vec![
            stop(a.clone(), 1, at(8, 0), at(9, 0)),
            stop(b.clone(), 2, at(8, 30), at(9, 30)),
            stop(c.clone(), 3, at(16, 0), at(16, 30)),
        ];
        let p = params(vec![a, b, c]).with_time_windows(false);
        let validation = ConstraintValidator::validate_route(&stops, &p);

        let kinds: Vec<ViolationKind> = validation.violations.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::WrongDate));
        assert!(kinds.contains(&ViolationKind::Overlap));
        assert!(!kinds.contains(&ViolationKind::ShiftLength));
        assert!(!validation.is_valid);
        assert_eq!(validation.penalty, 500.0 + 25.0);
    }

    #[test]
    fn long_shift_is_reported() {
        let early = Job::new("early", date());
        let late = Job::new("late", date());
        let mut tech_params = params(vec![early.clone(), late.clone()]);
        tech_params.technician = technician().with_hours(
            Weekday::Mon,
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
        );

        let stops = vec![
            stop(early, 1, at(6, 0), at(7, 0)),
            stop(late, 2, at(19, 0), at(20, 0)),
        ];
        let validation = ConstraintValidator::validate_route(&stops, &tech_params);
        assert_eq!(validation.violations.len(), 1);
        assert_eq!(validation.violations[0].kind, ViolationKind::ShiftLength);
        assert_eq!(validation.penalty, 25.0);
    }

    #[test]
    fn empty_route_is_valid() {
        let validation = ConstraintValidator::validate_route(&[], &params(Vec::new()));
        assert!(validation.is_valid);
        assert_eq!(validation.penalty, 0.0);
    }

    #[test]
    fn penalty_weights() {
        assert_eq!(ViolationKind::Skills.penalty(), 200.0);
        assert_eq!(ViolationKind::WrongDate.penalty(), 500.0);
        assert_eq!(ViolationKind::WorkingHours.penalty(), 100.0);
        assert_eq!(ViolationKind::TimeWindow.penalty(), 50.0);
        assert_eq!(ViolationKind::Overlap.penalty(), 25.0);
    }
}

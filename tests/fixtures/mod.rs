//! Shared builders for route-sequencer integration tests.

#![allow(dead_code)]

pub mod service_sites;

use chrono::{NaiveDate, NaiveTime, Weekday};
use route_sequencer::{Coordinate, Job, OptimizationParameters, Technician};

pub use service_sites::*;

pub const NEW_YORK: Coordinate = Coordinate::new(40.7128, -74.0060);
pub const LOS_ANGELES: Coordinate = Coordinate::new(34.0522, -118.2437);
pub const CHICAGO: Coordinate = Coordinate::new(41.8781, -87.6298);

/// A Monday.
pub fn service_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Technician working Monday to Friday, 08:00 to 17:00.
pub fn weekday_technician(id: &str) -> Technician {
    [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
        .into_iter()
        .fold(Technician::new(id).with_hourly_rate(30.0), |tech, day| {
            tech.with_hours(day, hm(8, 0), hm(17, 0))
        })
}

pub fn job_at(id: &str, location: Coordinate) -> Job {
    Job::new(id, service_date())
        .with_location(location)
        .with_duration_minutes(30)
}

/// Jobs at the real service sites.
pub fn site_jobs(count: usize) -> Vec<Job> {
    sample_sites(count)
        .into_iter()
        .enumerate()
        .map(|(i, site)| {
            job_at(&format!("job-{}", i + 1), site.location)
                .with_address(format!("{} #{}", site.name, i / SITES.len() + 1))
                .with_revenue(100.0 + 15.0 * i as f64)
        })
        .collect()
}

/// `count` jobs on a square grid with 1 km-ish spacing, so job density is
/// the same whatever the count.
pub fn grid_jobs(count: usize) -> Vec<Job> {
    let side = (count as f64).sqrt().ceil() as usize;
    (0..count)
        .map(|i| {
            let (row, col) = (i / side, i % side);
            let location = Coordinate::new(36.0 + 0.009 * row as f64, -115.2 + 0.011 * col as f64);
            job_at(&format!("grid-{}", i + 1), location)
        })
        .collect()
}

pub fn parameters(jobs: Vec<Job>) -> OptimizationParameters {
    OptimizationParameters::new(jobs, weekday_technician("tech-1"), service_date())
        .with_start(DEPOT.location)
}

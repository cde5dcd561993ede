//! Great-circle distance estimation (fallback when no routing provider answers).
//!
//! Uses straight-line distance and an assumed average speed to estimate
//! travel time. Less accurate than road routing but always available.

use crate::error::RoutingError;
use crate::model::Coordinate;
use crate::traits::{Leg, RoutingProvider};

/// Average driving speed assumption for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lng = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Haversine-based routing provider.
///
/// Estimates travel time using straight-line distance and an assumed speed.
#[derive(Debug, Clone, Copy)]
pub struct HaversineProvider {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineProvider {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineProvider {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Convert distance in km to travel time in seconds.
    pub fn km_to_seconds(&self, km: f64) -> i64 {
        let hours = km / self.speed_kmh;
        (hours * 3600.0).round() as i64
    }

    pub fn leg(&self, from: Coordinate, to: Coordinate) -> Leg {
        let distance_km = haversine_km(from, to);
        Leg {
            distance_km,
            duration_seconds: self.km_to_seconds(distance_km),
        }
    }
}

impl RoutingProvider for HaversineProvider {
    fn distance_duration(&self, from: Coordinate, to: Coordinate) -> Result<Leg, RoutingError> {
        Ok(self.leg(from, to))
    }
}

//! OSRM HTTP adapter for road distances and durations.

use serde::Deserialize;
use tracing::debug;

use crate::error::RoutingError;
use crate::matrix::DistanceMatrix;
use crate::model::Coordinate;
use crate::traits::{Leg, RoutingProvider};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, url: String) -> Result<T, RoutingError> {
        debug!(%url, "osrm request");
        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<T>())?;
        Ok(body)
    }
}

/// OSRM wants `lng,lat` pairs joined by `;`.
fn coordinate_path(locations: &[Coordinate]) -> String {
    locations
        .iter()
        .map(|c| format!("{:.6},{:.6}", c.longitude, c.latitude))
        .collect::<Vec<_>>()
        .join(";")
}

impl RoutingProvider for OsrmClient {
    fn distance_duration(&self, from: Coordinate, to: Coordinate) -> Result<Leg, RoutingError> {
        let url = format!(
            "{}/route/v1/{}/{}?overview=false",
            self.config.base_url,
            self.config.profile,
            coordinate_path(&[from, to])
        );
        self.get::<OsrmRouteResponse>(url)?.into_leg()
    }

    fn distance_matrix(&self, locations: &[Coordinate]) -> Result<DistanceMatrix, RoutingError> {
        let url = format!(
            "{}/table/v1/{}/{}?annotations=distance,duration",
            self.config.base_url,
            self.config.profile,
            coordinate_path(locations)
        );
        self.get::<OsrmTableResponse>(url)?.into_matrix(locations)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
}

impl OsrmRouteResponse {
    fn into_leg(self) -> Result<Leg, RoutingError> {
        let route = self
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RoutingError::MissingData("no route".to_string()))?;
        Ok(Leg {
            distance_km: route.distance / 1000.0,
            duration_seconds: route.duration.round() as i64,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    distances: Option<Vec<Vec<Option<f64>>>>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    fn into_matrix(self, locations: &[Coordinate]) -> Result<DistanceMatrix, RoutingError> {
        let n = locations.len();
        let distances = self
            .distances
            .ok_or_else(|| RoutingError::MissingData("distances".to_string()))?;
        let durations = self
            .durations
            .ok_or_else(|| RoutingError::MissingData("durations".to_string()))?;

        let distances = flatten(distances, n, "distances")?;
        let durations = flatten(durations, n, "durations")?;

        DistanceMatrix::from_parts(
            locations.to_vec(),
            distances.into_iter().map(|m| m / 1000.0).collect(),
            durations.into_iter().map(|s| s.round() as i64).collect(),
        )
        .ok_or_else(|| RoutingError::MissingData("table shape".to_string()))
    }
}

/// Row-major values of an `n x n` table; unroutable (null) cells are an error.
fn flatten(rows: Vec<Vec<Option<f64>>>, n: usize, what: &str) -> Result<Vec<f64>, RoutingError> {
    if rows.len() != n || rows.iter().any(|row| row.len() != n) {
        return Err(RoutingError::MissingData(format!("{} table shape", what)));
    }
    rows.into_iter()
        .flatten()
        .map(|cell| cell.ok_or_else(|| RoutingError::MissingData(format!("null {} cell", what))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_points() -> Vec<Coordinate> {
        vec![Coordinate::new(36.1, -115.1), Coordinate::new(36.2, -115.2)]
    }

    #[test]
    fn coordinates_are_lng_lat() {
        assert_eq!(
            coordinate_path(&two_points()),
            "-115.100000,36.100000;-115.200000,36.200000"
        );
    }

    #[test]
    fn parses_route_response() {
        let body = r#"{"code":"Ok","routes":[{"distance":12345.6,"duration":901.4,"legs":[]}]}"#;
        let response: OsrmRouteResponse = serde_json::from_str(body).unwrap();
        let leg = response.into_leg().unwrap();
        assert!((leg.distance_km - 12.3456).abs() < 1e-9);
        assert_eq!(leg.duration_seconds, 901);
    }

    #[test]
    fn empty_route_list_is_missing_data() {
        let response: OsrmRouteResponse = serde_json::from_str(r#"{"code":"NoRoute"}"#).unwrap();
        assert!(matches!(response.into_leg(), Err(RoutingError::MissingData(_))));
    }

    #[test]
    fn parses_table_response() {
        let body = r#"{
            "code": "Ok",
            "distances": [[0, 2500.0], [2600.0, 0]],
            "durations": [[0, 180.4], [190.6, 0]]
        }"#;
        let response: OsrmTableResponse = serde_json::from_str(body).unwrap();
        let matrix = response.into_matrix(&two_points()).unwrap();
        assert_eq!(matrix.size(), 2);
        assert!((matrix.distance(0, 1) - 2.5).abs() < 1e-9);
        assert!((matrix.distance(1, 0) - 2.6).abs() < 1e-9);
        assert_eq!(matrix.duration(0, 1), 180);
        assert_eq!(matrix.duration(1, 0), 191);
    }

    #[test]
    fn null_table_cell_is_missing_data() {
        let body = r#"{"distances": [[0, null], [1.0, 0]], "durations": [[0, 1.0], [1.0, 0]]}"#;
        let response: OsrmTableResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            response.into_matrix(&two_points()),
            Err(RoutingError::MissingData(_))
        ));
    }

    #[test]
    fn table_without_distances_is_missing_data() {
        let body = r#"{"durations": [[0, 1.0], [1.0, 0]]}"#;
        let response: OsrmTableResponse = serde_json::from_str(body).unwrap();
        assert!(response.into_matrix(&two_points()).is_err());
    }
}

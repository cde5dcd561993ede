//! All-pairs distance/duration matrices and the builder that produces them.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::BoundedDistanceCache;
use crate::error::RoutingError;
use crate::haversine::HaversineProvider;
use crate::model::Coordinate;
use crate::traits::{DistanceCache, Leg, RoutingProvider};

/// Dense distance (km) and duration (seconds) tables over a location list.
///
/// Both tables are row-major and indexed by position in `locations`.
/// The diagonal is always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    locations: Vec<Coordinate>,
    distances: Vec<f64>,
    durations: Vec<i64>,
}

impl DistanceMatrix {
    /// Builds a matrix from row-major legs.
    ///
    /// Returns `None` if `legs` does not hold exactly `n * n` entries.
    pub fn from_legs(locations: Vec<Coordinate>, legs: &[Leg]) -> Option<Self> {
        let distances = legs.iter().map(|leg| leg.distance_km).collect();
        let durations = legs.iter().map(|leg| leg.duration_seconds).collect();
        Self::from_parts(locations, distances, durations)
    }

    /// Builds a matrix from explicit row-major tables.
    ///
    /// Returns `None` if either table does not hold exactly `n * n` entries.
    pub fn from_parts(
        locations: Vec<Coordinate>,
        mut distances: Vec<f64>,
        mut durations: Vec<i64>,
    ) -> Option<Self> {
        let n = locations.len();
        if distances.len() != n * n || durations.len() != n * n {
            return None;
        }
        for i in 0..n {
            distances[i * n + i] = 0.0;
            durations[i * n + i] = 0;
        }
        Some(Self {
            locations,
            distances,
            durations,
        })
    }

    pub fn size(&self) -> usize {
        self.locations.len()
    }

    pub fn locations(&self) -> &[Coordinate] {
        &self.locations
    }

    /// Distance in km from location `from` to location `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from * self.size() + to]
    }

    /// Duration in seconds from location `from` to location `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn duration(&self, from: usize, to: usize) -> i64 {
        self.durations[from * self.size() + to]
    }

    /// Checked lookup of one cell.
    pub fn leg(&self, from: usize, to: usize) -> Option<Leg> {
        let n = self.size();
        if from >= n || to >= n {
            return None;
        }
        let cell = from * n + to;
        Some(Leg {
            distance_km: *self.distances.get(cell)?,
            duration_seconds: *self.durations.get(cell)?,
        })
    }

    /// Position of `location` in the matrix, matched at micro-degree precision.
    pub fn index_of(&self, location: &Coordinate) -> Option<usize> {
        let key = location.key();
        self.locations.iter().position(|candidate| candidate.key() == key)
    }
}

/// Produces distance matrices from a routing provider with great-circle fallback.
///
/// The cache holds legs from the builder's primary source: provider answers
/// (directional) when a provider is configured, otherwise great-circle
/// estimates (stored for both directions).
#[derive(Clone)]
pub struct MatrixBuilder {
    provider: Option<Arc<dyn RoutingProvider>>,
    cache: Arc<dyn DistanceCache>,
    fallback: HaversineProvider,
}

impl Default for MatrixBuilder {
    fn default() -> Self {
        Self {
            provider: None,
            cache: Arc::new(BoundedDistanceCache::default()),
            fallback: HaversineProvider::default(),
        }
    }
}

impl std::fmt::Debug for MatrixBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixBuilder")
            .field("has_provider", &self.provider.is_some())
            .field("cached_legs", &self.cache.len())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl MatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn RoutingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn DistanceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_fallback_speed(mut self, speed_kmh: f64) -> Self {
        self.fallback = HaversineProvider::new(speed_kmh);
        self
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn cache(&self) -> &Arc<dyn DistanceCache> {
        &self.cache
    }

    /// Builds a matrix using the provider, falling back per pair.
    ///
    /// Pairs are resolved concurrently; the result does not depend on
    /// completion order.
    pub fn build(&self, locations: &[Coordinate]) -> DistanceMatrix {
        let Some(provider) = self.provider.as_deref() else {
            return self.build_fallback(locations);
        };

        let n = locations.len();
        if n <= 1 {
            return zero_matrix(locations);
        }

        match provider.distance_matrix(locations) {
            Ok(matrix) if matrix.size() == n => {
                for (i, from) in locations.iter().enumerate() {
                    for (j, to) in locations.iter().enumerate() {
                        if let Some(leg) = matrix.leg(i, j) {
                            self.cache.insert(*from, *to, leg);
                        }
                    }
                }
                return matrix;
            }
            Ok(matrix) => {
                warn!(
                    expected = n,
                    received = matrix.size(),
                    "routing provider returned a matrix of the wrong size"
                );
            }
            Err(RoutingError::Unsupported) => {}
            Err(err) => {
                debug!(%err, locations = n, "provider matrix lookup failed, resolving pairs");
            }
        }

        let legs: Vec<Leg> = (0..n * n)
            .into_par_iter()
            .map(|cell| {
                let (i, j) = (cell / n, cell % n);
                if i == j {
                    Leg::ZERO
                } else {
                    self.provider_leg(provider, locations[i], locations[j])
                }
            })
            .collect();

        assemble(locations, &legs)
    }

    /// Builds a matrix from great-circle estimates only, synchronously.
    pub fn build_fallback(&self, locations: &[Coordinate]) -> DistanceMatrix {
        let n = locations.len();
        let mut legs = vec![Leg::ZERO; n * n];

        for i in 0..n {
            for j in (i + 1)..n {
                let leg = self.estimated_leg(locations[i], locations[j]);
                legs[i * n + j] = leg;
                legs[j * n + i] = leg;
            }
        }

        assemble(locations, &legs)
    }

    /// Great-circle leg, consulting the cache when estimates are the primary source.
    pub fn estimated_leg(&self, from: Coordinate, to: Coordinate) -> Leg {
        if self.provider.is_some() {
            return self.fallback.leg(from, to);
        }

        if let Some(leg) = self.cache.get(from, to) {
            return leg;
        }
        let leg = self.fallback.leg(from, to);
        self.cache.insert(from, to, leg);
        self.cache.insert(to, from, leg);
        leg
    }

    /// Leg of a fixed distance at the fallback speed.
    pub fn estimated_leg_for_distance(&self, distance_km: f64) -> Leg {
        Leg {
            distance_km,
            duration_seconds: self.fallback.km_to_seconds(distance_km),
        }
    }

    fn provider_leg(&self, provider: &dyn RoutingProvider, from: Coordinate, to: Coordinate) -> Leg {
        if let Some(leg) = self.cache.get(from, to) {
            return leg;
        }

        match provider.distance_duration(from, to) {
            Ok(leg) => {
                self.cache.insert(from, to, leg);
                leg
            }
            Err(err) => {
                debug!(%err, %from, %to, "routing provider failed, using great-circle estimate");
                self.fallback.leg(from, to)
            }
        }
    }
}

fn zero_matrix(locations: &[Coordinate]) -> DistanceMatrix {
    let n = locations.len();
    assemble(locations, &vec![Leg::ZERO; n * n])
}

fn assemble(locations: &[Coordinate], legs: &[Leg]) -> DistanceMatrix {
    let n = locations.len();
    let mut distances = Vec::with_capacity(n * n);
    let mut durations = Vec::with_capacity(n * n);
    for leg in legs {
        distances.push(leg.distance_km);
        durations.push(leg.duration_seconds);
    }
    DistanceMatrix {
        locations: locations.to_vec(),
        distances,
        durations,
    }
}

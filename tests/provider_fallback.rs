//! Matrix building against an unreachable OSRM server.

mod fixtures;

use std::sync::Arc;

use route_sequencer::matrix::MatrixBuilder;
use route_sequencer::osrm::{OsrmClient, OsrmConfig};
use route_sequencer::traits::RoutingProvider;
use route_sequencer::{Algorithm, CancellationToken, RouteEngine};

use fixtures::*;

fn unreachable_client() -> OsrmClient {
    // Port 9 (discard) refuses connections on any sane test host.
    OsrmClient::new(OsrmConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        profile: "car".to_string(),
        timeout_secs: 1,
    })
    .unwrap()
}

#[test]
fn provider_errors_surface_from_the_client() {
    let client = unreachable_client();
    assert!(client.distance_duration(SITES[0].location, SITES[1].location).is_err());
    assert!(client.distance_matrix(&[SITES[0].location, SITES[1].location]).is_err());
}

#[test]
fn unreachable_provider_falls_back_to_estimates() {
    let builder = MatrixBuilder::new().with_provider(Arc::new(unreachable_client()));
    let locations: Vec<_> = sample_sites(5).iter().map(|s| s.location).collect();

    let matrix = builder.build(&locations);
    assert_eq!(matrix, builder.build_fallback(&locations));
    // Fallback legs are never cached as provider answers.
    assert!(builder.cache().is_empty());
}

#[test]
fn engine_still_sequences_without_a_provider() {
    let engine = RouteEngine::new().with_provider(Arc::new(unreachable_client()));
    let result = engine
        .optimize(&parameters(site_jobs(4)), Algorithm::NearestNeighbor, &CancellationToken::new())
        .unwrap();
    assert_eq!(result.stops.len(), 4);
}

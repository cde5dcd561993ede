//! Real Las Vegas / Henderson service addresses.
//!
//! Coordinates sourced from OpenStreetMap; spread across the valley so
//! routes have real structure instead of a straight line.

use route_sequencer::Coordinate;

#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub name: &'static str,
    pub location: Coordinate,
}

impl Site {
    pub const fn new(name: &'static str, latitude: f64, longitude: f64) -> Self {
        Self {
            name,
            location: Coordinate::new(latitude, longitude),
        }
    }
}

/// Depot on the Strip.
pub const DEPOT: Site = Site::new("MGM Grand", 36.1023654, -115.1688720);

pub const SITES: &[Site] = &[
    Site::new("Hard Rock Cafe", 36.1041592, -115.1722166),
    Site::new("Public House", 36.1219193, -115.1689317),
    Site::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Site::new("Spago", 36.1139368, -115.1741462),
    Site::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Site::new("Islander's Grill", 36.0335058, -114.9856162),
    Site::new("Naga", 36.0137634, -114.9928676),
    Site::new("Green Valley Ranch Area", 36.0308, -115.0825),
    Site::new("Sunset Station Area", 36.0614, -115.0631),
    Site::new("Rivas Mexican Grill North", 36.1450055, -115.0482587),
    Site::new("Monarca Mexican Restaurant", 36.1440711, -115.0634197),
    Site::new("Beers and Bets", 36.1428945, -115.1573836),
    Site::new("Bootlegger Bistro", 36.0492047, -115.1715744),
    Site::new("Denny's South", 36.0591086, -115.1717250),
    Site::new("Longhorn Casino", 36.1070664, -115.0591256),
    Site::new("Extended Stay Henderson", 36.1283949, -115.0826989),
];

/// The first `count` sites, cycling when more are requested.
pub fn sample_sites(count: usize) -> Vec<Site> {
    SITES.iter().copied().cycle().take(count).collect()
}

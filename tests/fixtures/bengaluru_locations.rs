//! Bengaluru service locations for realistic test fixtures.
//!
//! Approximate coordinates of well-known landmarks, used as facility sites
//! and worker positions.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinate(&self) -> field_geotrack::Coordinate {
        field_geotrack::Coordinate::new(self.lat, self.lng)
    }
}

// ============================================================================
// Service centers (facility candidates)
// ============================================================================

pub const SERVICE_CENTERS: &[Location] = &[
    Location::new("MG Road", 12.9756, 77.6050),
    Location::new("Koramangala", 12.9352, 77.6245),
    Location::new("Whitefield", 12.9698, 77.7500),
    Location::new("Jayanagar", 12.9250, 77.5938),
    Location::new("Hebbal", 13.0358, 77.5970),
];

// ============================================================================
// Customer sites
// ============================================================================

pub const CUSTOMER_SITES: &[Location] = &[
    Location::new("Indiranagar", 12.9784, 77.6408),
    Location::new("BTM Layout", 12.9166, 77.6101),
    Location::new("Yelahanka", 13.1007, 77.5963),
    // Mysuru, well outside a 50 km radius of every center.
    Location::new("Mysuru Palace", 12.3052, 76.6552),
];

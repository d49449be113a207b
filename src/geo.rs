//! Great-circle math on WGS84 coordinates.
//!
//! Uses the haversine formula with a spherical Earth. Accurate to well
//! under 0.5% for the short hops field workers make between reports.

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;
use crate::model::Fix;

/// Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees.
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

    /// Checked constructor for caller-supplied values.
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, TrackingError> {
        let coordinate = Self::new(latitude, longitude);
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(TrackingError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Haversine distance between two points in meters.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1_rad = a.latitude.to_radians();
    let lat2_rad = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.min(1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Seconds between two fixes, regardless of order.
pub fn elapsed_seconds(a: &impl Fix, b: &impl Fix) -> f64 {
    let delta = b.observed_at() - a.observed_at();
    delta.num_milliseconds().abs() as f64 / 1000.0
}

/// Speed in m/s between two fixes.
///
/// Zero elapsed time yields `f64::INFINITY`.
pub fn speed(a: &impl Fix, b: &impl Fix) -> f64 {
    let elapsed = elapsed_seconds(a, b);
    if elapsed == 0.0 {
        return f64::INFINITY;
    }
    distance(a.position(), b.position()) / elapsed
}

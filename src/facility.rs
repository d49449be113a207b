//! Facilities and the linear-scan nearest lookup.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geo::{self, Coordinate};

/// Distances closer than this are treated as equal; lower id wins.
pub const TIE_TOLERANCE_M: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(pub u64);

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A service location. Read-only from this crate's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    /// Facilities without a geocoded location are never matched.
    pub coordinate: Option<Coordinate>,
    pub active: bool,
}

impl Facility {
    pub fn new(id: u64, coordinate: Coordinate, active: bool) -> Self {
        Self {
            id: FacilityId(id),
            coordinate: Some(coordinate),
            active,
        }
    }
}

/// A facility together with its distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityMatch {
    pub facility: Facility,
    pub distance_m: f64,
}

/// Picks the winner from a set of in-range matches.
///
/// The minimum distance is found first, then the lowest id among every match
/// within tolerance of it, so the answer does not depend on input order.
pub fn closest_of(matches: Vec<FacilityMatch>) -> Option<FacilityMatch> {
    let best_distance = matches
        .iter()
        .map(|m| m.distance_m)
        .min_by(|a, b| a.total_cmp(b))?;

    matches
        .into_iter()
        .filter(|m| m.distance_m - best_distance <= TIE_TOLERANCE_M)
        .min_by_key(|m| m.facility.id)
}

/// Closest active facility within `radius_m` of `point`, by exhaustive scan.
pub fn nearest_within(point: Coordinate, radius_m: f64, candidates: &[Facility]) -> Option<FacilityMatch> {
    let in_range: Vec<FacilityMatch> = candidates
        .par_iter()
        .filter(|facility| facility.active)
        .filter_map(|facility| {
            let coordinate = facility.coordinate?;
            let distance_m = geo::distance(point, coordinate);
            (distance_m <= radius_m).then(|| FacilityMatch {
                facility: facility.clone(),
                distance_m,
            })
        })
        .collect();

    closest_of(in_range)
}

//! HTTP adapter for a spatial-capable facility store.
//!
//! The store exposes two read endpoints:
//! - `GET {base}/capabilities` -> `{"spatial_index": bool}`
//! - `GET {base}/facilities/nearest?lat=..&lon=..&radius_m=..` -> candidates
//!   within the radius with server-computed distances.
//!
//! The final pick is made locally with `facility::closest_of` so both lookup
//! paths share one tie-break rule.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::BackendError;
use crate::facility::{self, Facility, FacilityId, FacilityMatch};
use crate::geo::Coordinate;
use crate::traits::IndexedFacilityLookup;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub base_url: String,
    /// Upper bound for the probe request.
    pub timeout_secs: u64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8070".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpatialClient {
    config: SpatialConfig,
    client: reqwest::blocking::Client,
}

impl SpatialClient {
    pub fn new(config: SpatialConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

impl IndexedFacilityLookup for SpatialClient {
    fn probe(&self) -> Result<bool, BackendError> {
        let response = self.client.get(self.url("capabilities")).send()?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        let body: CapabilitiesResponse = response.json()?;
        Ok(body.spatial_index)
    }

    fn indexed_nearest(
        &self,
        point: Coordinate,
        radius_m: f64,
        timeout: Duration,
    ) -> Result<Option<FacilityMatch>, BackendError> {
        let response = self
            .client
            .get(self.url("facilities/nearest"))
            .query(&[
                ("lat", format!("{:.6}", point.latitude)),
                ("lon", format!("{:.6}", point.longitude)),
                ("radius_m", format!("{:.3}", radius_m)),
            ])
            .timeout(timeout)
            .send()?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        let body: NearestResponse = response.json()?;
        debug!(candidates = body.candidates.len(), "indexed nearest response");

        let matches = body
            .candidates
            .into_iter()
            .filter(|c| c.active && c.distance_m <= radius_m)
            .map(|c| FacilityMatch {
                facility: Facility {
                    id: FacilityId(c.id),
                    coordinate: Some(Coordinate::new(c.latitude, c.longitude)),
                    active: c.active,
                },
                distance_m: c.distance_m,
            })
            .collect();

        Ok(facility::closest_of(matches))
    }
}

#[derive(Debug, Deserialize)]
struct CapabilitiesResponse {
    #[serde(default)]
    spatial_index: bool,
}

#[derive(Debug, Deserialize)]
struct NearestResponse {
    #[serde(default)]
    candidates: Vec<NearestCandidate>,
}

#[derive(Debug, Deserialize)]
struct NearestCandidate {
    id: u64,
    latitude: f64,
    longitude: f64,
    distance_m: f64,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

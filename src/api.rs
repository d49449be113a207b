//! Request/response contracts for the position-report, nearest-facility and
//! trip-summary endpoints, and a facade that serves them.
//!
//! Transport is left to the embedder; these types are what goes over the wire.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::TrackingConfig;
use crate::error::{ConfigError, Result, TrackingError};
use crate::facility::FacilityId;
use crate::geo::Coordinate;
use crate::ingest::{AnomalyReason, IngestOutcome, PositionIngestService, PositionReport, ThresholdsHandle};
use crate::model::{OriginRef, SampleId, SampleKind, SessionId, SubjectId};
use crate::resolver::{NoIndex, ProximityResolver, ResolvePath};
use crate::spatial::SpatialClient;
use crate::traits::{
    FacilitySource, IndexedFacilityLookup, NoLabels, NoSessions, OriginLabelResolver, PositionStore,
    SessionProvider,
};
use crate::trip::{TripAggregator, TripSummary};

/// `POST position-report` body.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionReportRequest {
    pub subject_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_kind")]
    pub sample_kind: SampleKind,
    #[serde(default)]
    pub linked_session_id: Option<String>,
    #[serde(default)]
    pub origin_ref: Option<OriginRef>,
}

fn default_kind() -> SampleKind {
    SampleKind::RoutePoint
}

impl From<PositionReportRequest> for PositionReport {
    fn from(request: PositionReportRequest) -> Self {
        PositionReport {
            subject_id: SubjectId::new(request.subject_id),
            timestamp: request.timestamp,
            coordinate: Coordinate::new(request.latitude, request.longitude),
            sample_kind: request.sample_kind,
            linked_session_id: request.linked_session_id.map(SessionId),
            origin_ref: request.origin_ref,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    Duplicate,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReportResponse {
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<SampleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspicious: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<AnomalyReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PositionReportResponse {
    fn error(err: &TrackingError) -> Self {
        Self {
            status: ReportStatus::Error,
            sample_id: None,
            suspicious: None,
            anomalies: Vec::new(),
            reason: Some(err.reason().to_string()),
        }
    }
}

/// `GET nearest-facility` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct NearestFacilityQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub radius_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    NoneFound,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NearestFacilityResponse {
    Found {
        facility_id: FacilityId,
        distance_m: f64,
        path: ResolvePath,
    },
    Status {
        status: QueryStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// `GET trip-summary` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct TripSummaryQuery {
    pub subject_id: String,
    pub date: NaiveDate,
    /// Subject's reporting offset from UTC; UTC when absent.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripPointView {
    pub sample_id: SampleId,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub sample_kind: SampleKind,
    pub suspicious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummaryResponse {
    pub points: Vec<TripPointView>,
    pub speed_kmh: Option<f64>,
    /// `H:MM:SS`
    pub traveled_duration: Option<String>,
    pub distance_m: Option<f64>,
    pub any_suspicious: bool,
}

impl From<TripSummary> for TripSummaryResponse {
    fn from(summary: TripSummary) -> Self {
        let points = summary
            .points
            .into_iter()
            .map(|point| TripPointView {
                sample_id: point.sample.id,
                timestamp: point.sample.timestamp,
                latitude: point.sample.coordinate.latitude,
                longitude: point.sample.coordinate.longitude,
                sample_kind: point.sample.sample_kind,
                suspicious: point.sample.suspicious,
                label: point.label,
            })
            .collect();

        Self {
            points,
            speed_kmh: summary.speed_kmh,
            traveled_duration: summary.traveled_duration.map(|d| {
                let secs = d.num_seconds();
                format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
            }),
            distance_m: summary.distance_m,
            any_suspicious: summary.any_suspicious,
        }
    }
}

/// Serves the three endpoints on top of the services.
pub struct TrackingApi<P, S, I = NoIndex, X = NoSessions, L = NoLabels> {
    ingest: PositionIngestService<P, X>,
    resolver: ProximityResolver<S, I>,
    trips: TripAggregator<P, L>,
}

impl<P, S, I, X, L> TrackingApi<P, S, I, X, L>
where
    P: PositionStore,
    S: FacilitySource,
    I: IndexedFacilityLookup,
    X: SessionProvider,
    L: OriginLabelResolver,
{
    pub fn new(
        ingest: PositionIngestService<P, X>,
        resolver: ProximityResolver<S, I>,
        trips: TripAggregator<P, L>,
    ) -> Self {
        Self {
            ingest,
            resolver,
            trips,
        }
    }

    pub fn ingest_service(&self) -> &PositionIngestService<P, X> {
        &self.ingest
    }

    pub fn resolver(&self) -> &ProximityResolver<S, I> {
        &self.resolver
    }

    /// Well-formed reports always get `ok` or `duplicate`.
    pub fn post_position_report(&self, request: PositionReportRequest) -> PositionReportResponse {
        match self.ingest.ingest(request.into()) {
            Ok(IngestOutcome::Accepted { sample, anomalies }) => PositionReportResponse {
                status: ReportStatus::Ok,
                sample_id: Some(sample.id),
                suspicious: Some(sample.suspicious),
                anomalies,
                reason: None,
            },
            Ok(IngestOutcome::Duplicate { existing }) => PositionReportResponse {
                status: ReportStatus::Duplicate,
                sample_id: Some(existing),
                suspicious: None,
                anomalies: Vec::new(),
                reason: Some("duplicate".to_string()),
            },
            Err(err) => {
                if !err.is_invalid_input() {
                    error!(error = %err, "position report not stored");
                }
                PositionReportResponse::error(&err)
            }
        }
    }

    pub fn get_nearest_facility(&self, query: NearestFacilityQuery) -> NearestFacilityResponse {
        let point = Coordinate::new(query.lat, query.lon);
        let result = match query.radius_m {
            Some(radius_m) => self.resolver.resolve_within(point, radius_m),
            None => self.resolver.resolve(point),
        };
        match result {
            Ok(Some(resolution)) => NearestFacilityResponse::Found {
                facility_id: resolution.matched.facility.id,
                distance_m: resolution.matched.distance_m,
                path: resolution.path,
            },
            Ok(None) => NearestFacilityResponse::Status {
                status: QueryStatus::NoneFound,
                reason: None,
            },
            Err(err) => NearestFacilityResponse::Status {
                status: QueryStatus::Error,
                reason: Some(err.reason().to_string()),
            },
        }
    }

    pub fn get_trip_summary(&self, query: TripSummaryQuery) -> Result<TripSummaryResponse> {
        let minutes = query.utc_offset_minutes.unwrap_or(0);
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(TrackingError::InvalidUtcOffset(minutes))?;
        let summary = self
            .trips
            .summarize(&SubjectId::new(query.subject_id), query.date, offset)?;
        Ok(summary.into())
    }
}

impl<P, S> TrackingApi<P, S, Option<SpatialClient>>
where
    P: PositionStore + Clone,
    S: FacilitySource,
{
    /// Wires the services from configuration. The spatial client is only
    /// built when an endpoint is configured, and only then does the resolver
    /// probe and record into the process-wide capability state.
    pub fn from_config(
        config: &TrackingConfig,
        positions: P,
        facilities: S,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let spatial = config.spatial.clone().map(SpatialClient::new).transpose()?;
        let thresholds = ThresholdsHandle::new(config.thresholds.clone());

        Ok(Self::new(
            PositionIngestService::new(positions.clone(), thresholds),
            ProximityResolver::new(facilities, spatial, config.resolver_options()),
            TripAggregator::new(positions),
        ))
    }
}

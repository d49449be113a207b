//! Position report ingestion: validation, dedup, anomaly scoring, persist.
//!
//! Anomaly flags are advisory. A suspicious sample is still stored; the flag
//! is computed once here and never revised.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, Result, TrackingError};
use crate::geo::{self, Coordinate};
use crate::model::{Fix, NewSample, OriginRef, PositionSample, SampleId, SampleKind, SessionId, SubjectId};
use crate::traits::{NoSessions, PositionStore, SessionProvider};

/// Limits beyond which a sample is considered physically implausible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyThresholds {
    pub max_speed_m_per_s: f64,
    pub max_jump_distance_m: f64,
    pub min_sample_interval_s: f64,
    /// Half-width of the duplicate window around a report's timestamp.
    pub dedup_window_s: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            max_speed_m_per_s: 22.0, // ~79 km/h
            max_jump_distance_m: 2000.0,
            min_sample_interval_s: 10.0,
            dedup_window_s: 5.0,
        }
    }
}

impl AnomalyThresholds {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let fields = [
            ("max_speed_m_per_s", self.max_speed_m_per_s),
            ("max_jump_distance_m", self.max_jump_distance_m),
            ("min_sample_interval_s", self.min_sample_interval_s),
            ("dedup_window_s", self.dedup_window_s),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn dedup_window(&self) -> Duration {
        Duration::try_milliseconds((self.dedup_window_s * 1000.0).round() as i64).unwrap_or(Duration::MAX)
    }
}

/// Shared, hot-swappable thresholds. Readers take a snapshot per call.
#[derive(Debug, Clone, Default)]
pub struct ThresholdsHandle {
    inner: Arc<RwLock<AnomalyThresholds>>,
}

impl ThresholdsHandle {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self {
            inner: Arc::new(RwLock::new(thresholds)),
        }
    }

    pub fn current(&self) -> AnomalyThresholds {
        self.inner.read().clone()
    }

    pub fn replace(&self, thresholds: AnomalyThresholds) -> std::result::Result<(), ConfigError> {
        thresholds.validate()?;
        *self.inner.write() = thresholds;
        Ok(())
    }
}

/// An inbound report before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub subject_id: SubjectId,
    /// ISO-8601 text as sent by the device.
    pub timestamp: Option<String>,
    pub coordinate: Coordinate,
    pub sample_kind: SampleKind,
    pub linked_session_id: Option<SessionId>,
    pub origin_ref: Option<OriginRef>,
}

impl PositionReport {
    pub fn new(subject_id: impl Into<String>, timestamp: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            subject_id: SubjectId::new(subject_id),
            timestamp: Some(timestamp.into()),
            coordinate,
            sample_kind: SampleKind::RoutePoint,
            linked_session_id: None,
            origin_ref: None,
        }
    }

    pub fn kind(mut self, kind: SampleKind) -> Self {
        self.sample_kind = kind;
        self
    }

    pub fn session(mut self, session: SessionId) -> Self {
        self.linked_session_id = Some(session);
        self
    }

    pub fn origin(mut self, origin: OriginRef) -> Self {
        self.origin_ref = Some(origin);
        self
    }
}

/// A rule that fired while scoring a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AnomalyReason {
    TooFast { speed_m_per_s: f64 },
    TooFarJump { distance_m: f64 },
    TooSoon { elapsed_s: f64 },
    /// The subject already has a newer sample.
    OutOfOrder { elapsed_s: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted {
        sample: PositionSample,
        anomalies: Vec<AnomalyReason>,
    },
    Duplicate {
        existing: SampleId,
    },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }

    pub fn sample(&self) -> Option<&PositionSample> {
        match self {
            IngestOutcome::Accepted { sample, .. } => Some(sample),
            IngestOutcome::Duplicate { .. } => None,
        }
    }
}

/// Parses device timestamps. Offset-less forms are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Scores `candidate` against the subject's latest stored sample.
pub fn score(
    previous: Option<&PositionSample>,
    candidate: &impl Fix,
    thresholds: &AnomalyThresholds,
) -> Vec<AnomalyReason> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let elapsed_s = (candidate.observed_at() - previous.timestamp).num_milliseconds() as f64 / 1000.0;
    if elapsed_s < 0.0 {
        return vec![AnomalyReason::OutOfOrder { elapsed_s }];
    }

    let mut reasons = Vec::new();
    let speed_m_per_s = geo::speed(previous, candidate);
    if speed_m_per_s > thresholds.max_speed_m_per_s {
        reasons.push(AnomalyReason::TooFast { speed_m_per_s });
    }
    let distance_m = geo::distance(previous.coordinate, candidate.position());
    if distance_m > thresholds.max_jump_distance_m {
        reasons.push(AnomalyReason::TooFarJump { distance_m });
    }
    if elapsed_s < thresholds.min_sample_interval_s {
        reasons.push(AnomalyReason::TooSoon { elapsed_s });
    }
    reasons
}

pub struct PositionIngestService<P, X = NoSessions> {
    store: P,
    sessions: X,
    thresholds: ThresholdsHandle,
}

impl<P: PositionStore> PositionIngestService<P, NoSessions> {
    pub fn new(store: P, thresholds: ThresholdsHandle) -> Self {
        Self::with_sessions(store, NoSessions, thresholds)
    }
}

impl<P, X> PositionIngestService<P, X>
where
    P: PositionStore,
    X: SessionProvider,
{
    pub fn with_sessions(store: P, sessions: X, thresholds: ThresholdsHandle) -> Self {
        Self {
            store,
            sessions,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &ThresholdsHandle {
        &self.thresholds
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    /// Validate, dedup, score and persist one report.
    ///
    /// Concurrent reports for the same subject are not serialized; two racing
    /// calls may each miss the other when scoring.
    pub fn ingest(&self, report: PositionReport) -> Result<IngestOutcome> {
        report.coordinate.validate()?;
        let timestamp = report
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or(TrackingError::MissingTimestamp)?;

        let thresholds = self.thresholds.current();
        let window = thresholds.dedup_window();
        let from = timestamp.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let to = timestamp.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let nearby = self.store.samples_between(&report.subject_id, from, to)?;
        if let Some(existing) = nearby.iter().min_by_key(|s| (s.timestamp - timestamp).abs()) {
            debug!(subject_id = %report.subject_id, existing = existing.id, "duplicate position report");
            return Ok(IngestOutcome::Duplicate { existing: existing.id });
        }

        let linked_session_id = match report.linked_session_id {
            Some(session) => Some(session),
            None => self.lookup_session(&report.subject_id, timestamp),
        };

        let mut sample = NewSample {
            subject_id: report.subject_id,
            timestamp,
            coordinate: report.coordinate,
            sample_kind: report.sample_kind,
            linked_session_id,
            suspicious: false,
            origin_ref: report.origin_ref,
        };

        let previous = self.store.latest_sample(&sample.subject_id)?;
        let anomalies = score(previous.as_ref(), &sample, &thresholds);
        sample.suspicious = !anomalies.is_empty();
        if sample.suspicious {
            warn!(subject_id = %sample.subject_id, ?anomalies, "suspicious position sample");
        }

        let sample = self.store.append(sample)?;
        debug!(subject_id = %sample.subject_id, sample_id = sample.id, "position sample stored");
        Ok(IngestOutcome::Accepted { sample, anomalies })
    }

    fn lookup_session(&self, subject_id: &SubjectId, at: DateTime<Utc>) -> Option<SessionId> {
        match self.sessions.active_session(subject_id, at) {
            Ok(session) => session,
            Err(err) => {
                warn!(subject_id = %subject_id, error = %err, "session lookup failed");
                None
            }
        }
    }
}

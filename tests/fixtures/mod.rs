//! Test fixtures for field-geotrack.
//!
//! Provides:
//! - Real Bengaluru locations
//! - Collaborator fakes (failing stores, counting spatial indexes)
//! - Report helpers with sensible defaults

#![allow(dead_code)]

pub mod bengaluru_locations;

pub use bengaluru_locations::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use field_geotrack::BackendError;
use field_geotrack::Coordinate;
use field_geotrack::api::PositionReportRequest;
use field_geotrack::facility::{self, Facility, FacilityMatch};
use field_geotrack::ingest::PositionReport;
use field_geotrack::model::{NewSample, OriginRef, PositionSample, SampleKind, SessionId, SubjectId};
use field_geotrack::traits::{FacilitySource, IndexedFacilityLookup, OriginLabelResolver, PositionStore, SessionProvider};

// ============================================================================
// Reports
// ============================================================================

/// `2024-01-01T{hh}:{mm}:{ss}Z`
pub fn at(hh: u32, mm: u32, ss: u32) -> String {
    format!("2024-01-01T{:02}:{:02}:{:02}Z", hh, mm, ss)
}

pub fn report(subject: &str, timestamp: &str, lat: f64, lng: f64) -> PositionReport {
    PositionReport::new(subject, timestamp, Coordinate::new(lat, lng))
}

pub fn request(subject: &str, timestamp: &str, lat: f64, lng: f64) -> PositionReportRequest {
    PositionReportRequest {
        subject_id: subject.to_string(),
        timestamp: Some(timestamp.to_string()),
        latitude: lat,
        longitude: lng,
        sample_kind: SampleKind::RoutePoint,
        linked_session_id: None,
        origin_ref: None,
    }
}

// ============================================================================
// Facilities
// ============================================================================

pub fn service_centers() -> Vec<Facility> {
    SERVICE_CENTERS
        .iter()
        .enumerate()
        .map(|(i, loc)| Facility::new(i as u64 + 1, loc.coordinate(), true))
        .collect()
}

/// Facility source that always fails.
pub struct BrokenFacilities;

impl FacilitySource for BrokenFacilities {
    fn list_active_facilities(&self) -> Result<Vec<Facility>, BackendError> {
        Err(BackendError::Store("facility table unavailable".to_string()))
    }
}

/// How a fake spatial index behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexMode {
    /// Probe succeeds and queries answer from the facility list.
    Healthy,
    /// Probe reports no spatial capability.
    Missing,
    /// Probe errors.
    ProbeFails,
    /// Probe succeeds, every query errors.
    QueryFails,
    /// Probe succeeds, queries take this long unless the timeout is shorter.
    Slow(Duration),
}

/// In-process spatial index that answers from a facility list and counts calls.
pub struct FakeSpatialIndex {
    facilities: Vec<Facility>,
    mode: IndexMode,
    probes: AtomicUsize,
    queries: AtomicUsize,
}

impl FakeSpatialIndex {
    pub fn new(facilities: Vec<Facility>, mode: IndexMode) -> Self {
        Self {
            facilities,
            mode,
            probes: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl IndexedFacilityLookup for FakeSpatialIndex {
    fn probe(&self) -> Result<bool, BackendError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            IndexMode::Missing => Ok(false),
            IndexMode::ProbeFails => Err(BackendError::Store("relation facility_geo does not exist".to_string())),
            _ => Ok(true),
        }
    }

    fn indexed_nearest(
        &self,
        point: Coordinate,
        radius_m: f64,
        timeout: Duration,
    ) -> Result<Option<FacilityMatch>, BackendError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            IndexMode::QueryFails => Err(BackendError::Status(503)),
            IndexMode::Slow(delay) if delay > timeout => {
                std::thread::sleep(timeout);
                Err(BackendError::Store("statement timeout".to_string()))
            }
            IndexMode::Slow(delay) => {
                std::thread::sleep(delay);
                Ok(facility::nearest_within(point, radius_m, &self.facilities))
            }
            _ => Ok(facility::nearest_within(point, radius_m, &self.facilities)),
        }
    }
}

// ============================================================================
// Position stores
// ============================================================================

/// Store whose reads work but whose writes fail.
#[derive(Default)]
pub struct ReadOnlyStore;

impl PositionStore for ReadOnlyStore {
    fn samples_between(
        &self,
        _subject_id: &SubjectId,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, BackendError> {
        Ok(Vec::new())
    }

    fn latest_sample(&self, _subject_id: &SubjectId) -> Result<Option<PositionSample>, BackendError> {
        Ok(None)
    }

    fn append(&self, _sample: NewSample) -> Result<PositionSample, BackendError> {
        Err(BackendError::Store("read-only replica".to_string()))
    }
}

// ============================================================================
// Sessions and labels
// ============================================================================

/// Every subject is in session `S-{subject}`.
pub struct FixedSessions;

impl SessionProvider for FixedSessions {
    fn active_session(&self, subject_id: &SubjectId, _at: DateTime<Utc>) -> Result<Option<SessionId>, BackendError> {
        Ok(Some(SessionId(format!("S-{}", subject_id))))
    }
}

pub struct BrokenSessions;

impl SessionProvider for BrokenSessions {
    fn active_session(&self, _subject_id: &SubjectId, _at: DateTime<Utc>) -> Result<Option<SessionId>, BackendError> {
        Err(BackendError::Store("attendance service down".to_string()))
    }
}

/// Labels keyed by record id; negative ids fail to resolve.
pub struct TaskLabels(pub HashMap<i64, String>);

impl OriginLabelResolver for TaskLabels {
    fn label_for(&self, origin: &OriginRef) -> Result<Option<String>, BackendError> {
        if origin.record_id < 0 {
            return Err(BackendError::Store("record deleted".to_string()));
        }
        Ok(self.0.get(&origin.record_id).cloned())
    }
}

pub fn task(record_id: i64) -> OriginRef {
    OriginRef {
        model: "project.task".to_string(),
        record_id,
    }
}

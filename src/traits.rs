//! Collaborator traits for the geotracking pipeline.
//!
//! The business-object store, the spatial index and the session registry
//! live outside this crate. Embedders implement these for their own
//! backends; `crate::store` has in-memory versions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::BackendError;
use crate::facility::{Facility, FacilityMatch};
use crate::geo::Coordinate;
use crate::model::{NewSample, OriginRef, PositionSample, SessionId, SubjectId};

/// Source of facility records for the linear-scan path.
pub trait FacilitySource {
    /// Active facilities. Entries without a coordinate are skipped by callers.
    fn list_active_facilities(&self) -> Result<Vec<Facility>, BackendError>;
}

/// A spatial-capable store that answers radius queries itself.
pub trait IndexedFacilityLookup {
    /// Whether a backend is wired at all. Unconfigured lookups are never
    /// probed and leave the capability state untouched.
    fn is_configured(&self) -> bool {
        true
    }

    /// Lightweight existence check for the indexed query path.
    fn probe(&self) -> Result<bool, BackendError>;

    /// Nearest active facility within `radius_m`, bounded by `timeout`.
    fn indexed_nearest(
        &self,
        point: Coordinate,
        radius_m: f64,
        timeout: Duration,
    ) -> Result<Option<FacilityMatch>, BackendError>;
}

/// Append-only position history.
pub trait PositionStore {
    /// Samples of `subject_id` with timestamps in `[from, to]`, any order.
    fn samples_between(
        &self,
        subject_id: &SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, BackendError>;

    /// The sample with the greatest timestamp for `subject_id`.
    fn latest_sample(&self, subject_id: &SubjectId) -> Result<Option<PositionSample>, BackendError>;

    /// Persist a sample and return it with its assigned id.
    fn append(&self, sample: NewSample) -> Result<PositionSample, BackendError>;
}

/// Resolves the work session a subject is in at a given time.
pub trait SessionProvider {
    fn active_session(
        &self,
        subject_id: &SubjectId,
        at: DateTime<Utc>,
    ) -> Result<Option<SessionId>, BackendError>;
}

/// Produces display labels for origin references.
pub trait OriginLabelResolver {
    fn label_for(&self, origin: &OriginRef) -> Result<Option<String>, BackendError>;
}

/// No sessions; ingest keeps whatever the caller supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessions;

impl SessionProvider for NoSessions {
    fn active_session(
        &self,
        _subject_id: &SubjectId,
        _at: DateTime<Utc>,
    ) -> Result<Option<SessionId>, BackendError> {
        Ok(None)
    }
}

/// No labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

impl OriginLabelResolver for NoLabels {
    fn label_for(&self, _origin: &OriginRef) -> Result<Option<String>, BackendError> {
        Ok(None)
    }
}

impl<T: FacilitySource + ?Sized> FacilitySource for &T {
    fn list_active_facilities(&self) -> Result<Vec<Facility>, BackendError> {
        (**self).list_active_facilities()
    }
}

impl<T: IndexedFacilityLookup + ?Sized> IndexedFacilityLookup for &T {
    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }

    fn probe(&self) -> Result<bool, BackendError> {
        (**self).probe()
    }

    fn indexed_nearest(
        &self,
        point: Coordinate,
        radius_m: f64,
        timeout: Duration,
    ) -> Result<Option<FacilityMatch>, BackendError> {
        (**self).indexed_nearest(point, radius_m, timeout)
    }
}

impl<T: PositionStore + ?Sized> PositionStore for &T {
    fn samples_between(
        &self,
        subject_id: &SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, BackendError> {
        (**self).samples_between(subject_id, from, to)
    }

    fn latest_sample(&self, subject_id: &SubjectId) -> Result<Option<PositionSample>, BackendError> {
        (**self).latest_sample(subject_id)
    }

    fn append(&self, sample: NewSample) -> Result<PositionSample, BackendError> {
        (**self).append(sample)
    }
}

impl<T: FacilitySource + ?Sized> FacilitySource for Arc<T> {
    fn list_active_facilities(&self) -> Result<Vec<Facility>, BackendError> {
        (**self).list_active_facilities()
    }
}

impl<T: PositionStore + ?Sized> PositionStore for Arc<T> {
    fn samples_between(
        &self,
        subject_id: &SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, BackendError> {
        (**self).samples_between(subject_id, from, to)
    }

    fn latest_sample(&self, subject_id: &SubjectId) -> Result<Option<PositionSample>, BackendError> {
        (**self).latest_sample(subject_id)
    }

    fn append(&self, sample: NewSample) -> Result<PositionSample, BackendError> {
        (**self).append(sample)
    }
}

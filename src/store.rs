//! In-memory position history and facility registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::BackendError;
use crate::facility::{Facility, FacilityId};
use crate::model::{NewSample, PositionSample, SubjectId};
use crate::traits::{FacilitySource, PositionStore};

/// Append-only per-subject sample lists.
#[derive(Debug)]
pub struct InMemoryPositionStore {
    samples: RwLock<HashMap<SubjectId, Vec<PositionSample>>>,
    next_id: AtomicU64,
}

impl Default for InMemoryPositionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of samples stored for `subject_id`.
    pub fn count(&self, subject_id: &SubjectId) -> usize {
        self.samples.read().get(subject_id).map_or(0, Vec::len)
    }

    /// Every sample of `subject_id` in insertion order.
    pub fn history(&self, subject_id: &SubjectId) -> Vec<PositionSample> {
        self.samples.read().get(subject_id).cloned().unwrap_or_default()
    }
}

impl PositionStore for InMemoryPositionStore {
    fn samples_between(
        &self,
        subject_id: &SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, BackendError> {
        let samples = self.samples.read();
        Ok(samples
            .get(subject_id)
            .map(|list| {
                list.iter()
                    .filter(|s| s.timestamp >= from && s.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest_sample(&self, subject_id: &SubjectId) -> Result<Option<PositionSample>, BackendError> {
        let samples = self.samples.read();
        Ok(samples
            .get(subject_id)
            .and_then(|list| list.iter().max_by_key(|s| (s.timestamp, s.id)))
            .cloned())
    }

    fn append(&self, sample: NewSample) -> Result<PositionSample, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let sample = sample.into_sample(id);
        self.samples
            .write()
            .entry(sample.subject_id.clone())
            .or_default()
            .push(sample.clone());
        Ok(sample)
    }
}

/// Facility registry keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryFacilities {
    facilities: RwLock<HashMap<FacilityId, Facility>>,
}

impl InMemoryFacilities {
    pub fn new(facilities: impl IntoIterator<Item = Facility>) -> Self {
        let store = Self::default();
        for facility in facilities {
            store.upsert(facility);
        }
        store
    }

    pub fn upsert(&self, facility: Facility) {
        self.facilities.write().insert(facility.id, facility);
    }

    /// Returns false if the facility is unknown.
    pub fn deactivate(&self, id: FacilityId) -> bool {
        match self.facilities.write().get_mut(&id) {
            Some(facility) => {
                facility.active = false;
                true
            }
            None => false,
        }
    }
}

impl FacilitySource for InMemoryFacilities {
    fn list_active_facilities(&self) -> Result<Vec<Facility>, BackendError> {
        let mut active: Vec<Facility> = self
            .facilities
            .read()
            .values()
            .filter(|f| f.active && f.coordinate.is_some())
            .cloned()
            .collect();
        active.sort_by_key(|f| f.id);
        Ok(active)
    }
}

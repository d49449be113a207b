//! Position sample data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Opaque identifier of a tracked subject (a field worker).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an attendance/work session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

/// Pointer to the business record that produced a sample (e.g. a task).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginRef {
    pub model: String,
    pub record_id: i64,
}

/// Store-assigned sample identifier.
pub type SampleId = u64;

/// Classification of a position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    RoutePoint,
    CheckIn,
    CheckOut,
}

/// One accepted location report. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub id: SampleId,
    pub subject_id: SubjectId,
    pub timestamp: DateTime<Utc>,
    pub coordinate: Coordinate,
    pub sample_kind: SampleKind,
    pub linked_session_id: Option<SessionId>,
    pub suspicious: bool,
    pub origin_ref: Option<OriginRef>,
}

/// A sample that passed validation and scoring but has no id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub subject_id: SubjectId,
    pub timestamp: DateTime<Utc>,
    pub coordinate: Coordinate,
    pub sample_kind: SampleKind,
    pub linked_session_id: Option<SessionId>,
    pub suspicious: bool,
    pub origin_ref: Option<OriginRef>,
}

impl NewSample {
    pub fn into_sample(self, id: SampleId) -> PositionSample {
        PositionSample {
            id,
            subject_id: self.subject_id,
            timestamp: self.timestamp,
            coordinate: self.coordinate,
            sample_kind: self.sample_kind,
            linked_session_id: self.linked_session_id,
            suspicious: self.suspicious,
            origin_ref: self.origin_ref,
        }
    }
}

/// A coordinate observed at an instant.
pub trait Fix {
    fn position(&self) -> Coordinate;

    fn observed_at(&self) -> DateTime<Utc>;
}

impl Fix for PositionSample {
    fn position(&self) -> Coordinate {
        self.coordinate
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Fix for NewSample {
    fn position(&self) -> Coordinate {
        self.coordinate
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

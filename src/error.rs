//! Error taxonomy for the geotracking pipeline.
//!
//! Only `TrackingError` reaches callers. `BackendError` is produced by the
//! collaborator seams and is absorbed by the proximity resolver.

use thiserror::Error;

/// Errors surfaced to callers of the public services.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Latitude outside [-90, 90] or longitude outside [-180, 180].
    #[error("Invalid coordinate: latitude={latitude}, longitude={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// Timestamp missing or not parseable.
    #[error("Missing or unparseable timestamp")]
    MissingTimestamp,

    /// Search radius negative or not a number.
    #[error("Invalid radius: {0}")]
    InvalidRadius(f64),

    /// UTC offset not strictly within ±24h.
    #[error("Invalid UTC offset: {0} minutes")]
    InvalidUtcOffset(i32),

    /// Calendar day outside the representable range.
    #[error("Invalid date: {0}")]
    InvalidDate(chrono::NaiveDate),

    /// Persistence failure in the position store.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl TrackingError {
    /// Whether this error belongs to the caller-input class.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, TrackingError::Backend(_))
    }

    /// Short machine-readable reason, used by the API layer.
    pub fn reason(&self) -> &'static str {
        match self {
            TrackingError::InvalidCoordinate { .. } => "invalid_coordinate",
            TrackingError::MissingTimestamp => "missing_timestamp",
            TrackingError::InvalidRadius(_) => "invalid_radius",
            TrackingError::InvalidUtcOffset(_) => "invalid_utc_offset",
            TrackingError::InvalidDate(_) => "invalid_date",
            TrackingError::Backend(_) => "backend_error",
        }
    }
}

/// Failures of an external store or the spatial index.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (connect, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Spatial store answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Any other store failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl BackendError {
    pub fn is_timeout(&self) -> bool {
        match self {
            BackendError::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

/// Result type for the public services.
pub type Result<T> = std::result::Result<T, TrackingError>;

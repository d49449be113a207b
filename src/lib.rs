//! field-geotrack
//!
//! Position ingestion, nearest-facility resolution and trip summaries for
//! mobile field workers.

pub mod api;
pub mod config;
pub mod error;
pub mod facility;
pub mod geo;
pub mod ingest;
pub mod model;
pub mod resolver;
pub mod spatial;
pub mod store;
pub mod traits;
pub mod trip;

pub use error::{BackendError, ConfigError, Result, TrackingError};
pub use geo::Coordinate;

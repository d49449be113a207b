//! Runtime configuration for the geotracking services.
//!
//! Loaded from JSON (every field optional) and then overridden from
//! `GEOTRACK_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::ingest::AnomalyThresholds;
use crate::resolver::{DEFAULT_RADIUS_M, ResolverOptions};
use crate::spatial::SpatialConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub thresholds: AnomalyThresholds,
    pub default_radius_m: f64,
    pub indexed_timeout_ms: u64,
    /// Spatial store endpoint; `None` means scan-only resolution.
    pub spatial: Option<SpatialConfig>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            thresholds: AnomalyThresholds::default(),
            default_radius_m: DEFAULT_RADIUS_M,
            indexed_timeout_ms: 2000,
            spatial: None,
        }
    }
}

impl TrackingConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Apply `GEOTRACK_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let float = |field: &'static str| -> Result<Option<f64>, ConfigError> {
            lookup(field)
                .map(|raw| {
                    raw.trim()
                        .parse::<f64>()
                        .map_err(|_| ConfigError::Invalid { field, value: raw })
                })
                .transpose()
        };

        if let Some(v) = float("GEOTRACK_MAX_SPEED_M_PER_S")? {
            self.thresholds.max_speed_m_per_s = v;
        }
        if let Some(v) = float("GEOTRACK_MAX_JUMP_DISTANCE_M")? {
            self.thresholds.max_jump_distance_m = v;
        }
        if let Some(v) = float("GEOTRACK_MIN_SAMPLE_INTERVAL_S")? {
            self.thresholds.min_sample_interval_s = v;
        }
        if let Some(v) = float("GEOTRACK_DEDUP_WINDOW_S")? {
            self.thresholds.dedup_window_s = v;
        }
        if let Some(v) = float("GEOTRACK_DEFAULT_RADIUS_M")? {
            self.default_radius_m = v;
        }
        if let Some(url) = lookup("GEOTRACK_SPATIAL_URL") {
            let spatial = self.spatial.get_or_insert_with(SpatialConfig::default);
            spatial.base_url = url;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.resolver_options().validate()
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            default_radius_m: self.default_radius_m,
            indexed_timeout: Duration::from_millis(self.indexed_timeout_ms),
        }
    }
}

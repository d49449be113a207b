//! Nearest-facility resolution with an indexed fast path and a scan fallback.
//!
//! The indexed backend is probed lazily on first use and the answer is
//! memoized in a [`CapabilityState`]. Backend failures on either the probe or
//! the query degrade to the linear scan and are never returned to callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{BackendError, ConfigError, Result, TrackingError};
use crate::facility::{self, FacilityMatch};
use crate::geo::Coordinate;
use crate::traits::{FacilitySource, IndexedFacilityLookup};

/// Default search radius in meters.
pub const DEFAULT_RADIUS_M: f64 = 50_000.0;

/// Default bound on a single indexed query.
pub const DEFAULT_INDEXED_TIMEOUT: Duration = Duration::from_secs(2);

/// Known state of the indexed query path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Capability {
    Unknown = 0,
    Available = 1,
    Unavailable = 2,
}

impl Capability {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Capability::Available,
            2 => Capability::Unavailable,
            _ => Capability::Unknown,
        }
    }
}

static GLOBAL_CAPABILITY: Lazy<Arc<CapabilityState>> = Lazy::new(|| Arc::new(CapabilityState::new()));

/// Memoized capability flag shared by resolvers.
///
/// A stale value only costs a slower path, so relaxed atomics are enough.
#[derive(Debug, Default)]
pub struct CapabilityState {
    value: AtomicU8,
}

impl CapabilityState {
    pub const fn new() -> Self {
        Self {
            value: AtomicU8::new(Capability::Unknown as u8),
        }
    }

    /// The process-wide instance.
    pub fn global() -> Arc<CapabilityState> {
        Arc::clone(&GLOBAL_CAPABILITY)
    }

    pub fn get(&self) -> Capability {
        Capability::from_u8(self.value.load(Ordering::Relaxed))
    }

    pub fn record(&self, available: bool) {
        let state = if available {
            Capability::Available
        } else {
            Capability::Unavailable
        };
        self.force(state);
    }

    /// Overwrite the cached state.
    pub fn force(&self, state: Capability) {
        self.value.store(state as u8, Ordering::Relaxed);
    }

    /// Forget the cached answer; the next resolution probes again.
    pub fn invalidate(&self) {
        self.force(Capability::Unknown);
    }
}

/// Which path produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePath {
    Indexed,
    LinearScan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub matched: FacilityMatch,
    pub path: ResolvePath,
}

/// One way of answering a nearest-facility query.
pub trait NearestFacilityStrategy {
    fn path(&self) -> ResolvePath;

    fn nearest(&self, point: Coordinate, radius_m: f64) -> std::result::Result<Option<FacilityMatch>, BackendError>;
}

/// Delegates the radius query to the spatial store.
pub struct IndexedStrategy<'a, I> {
    lookup: &'a I,
    timeout: Duration,
}

impl<'a, I: IndexedFacilityLookup> IndexedStrategy<'a, I> {
    pub fn new(lookup: &'a I, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }
}

impl<I: IndexedFacilityLookup> NearestFacilityStrategy for IndexedStrategy<'_, I> {
    fn path(&self) -> ResolvePath {
        ResolvePath::Indexed
    }

    fn nearest(&self, point: Coordinate, radius_m: f64) -> std::result::Result<Option<FacilityMatch>, BackendError> {
        self.lookup.indexed_nearest(point, radius_m, self.timeout)
    }
}

/// Loads every active facility and scans them.
pub struct LinearScanStrategy<'a, S> {
    source: &'a S,
}

impl<'a, S: FacilitySource> LinearScanStrategy<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }
}

impl<S: FacilitySource> NearestFacilityStrategy for LinearScanStrategy<'_, S> {
    fn path(&self) -> ResolvePath {
        ResolvePath::LinearScan
    }

    fn nearest(&self, point: Coordinate, radius_m: f64) -> std::result::Result<Option<FacilityMatch>, BackendError> {
        let candidates = self.source.list_active_facilities()?;
        Ok(facility::nearest_within(point, radius_m, &candidates))
    }
}

/// Placeholder lookup for deployments without a spatial store.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndex;

impl IndexedFacilityLookup for NoIndex {
    fn is_configured(&self) -> bool {
        false
    }

    fn probe(&self) -> std::result::Result<bool, BackendError> {
        Ok(false)
    }

    fn indexed_nearest(
        &self,
        _point: Coordinate,
        _radius_m: f64,
        _timeout: Duration,
    ) -> std::result::Result<Option<FacilityMatch>, BackendError> {
        Ok(None)
    }
}

/// `None` behaves like [`NoIndex`].
impl<T: IndexedFacilityLookup> IndexedFacilityLookup for Option<T> {
    fn is_configured(&self) -> bool {
        self.as_ref().is_some_and(|lookup| lookup.is_configured())
    }

    fn probe(&self) -> std::result::Result<bool, BackendError> {
        match self {
            Some(lookup) => lookup.probe(),
            None => Ok(false),
        }
    }

    fn indexed_nearest(
        &self,
        point: Coordinate,
        radius_m: f64,
        timeout: Duration,
    ) -> std::result::Result<Option<FacilityMatch>, BackendError> {
        match self {
            Some(lookup) => lookup.indexed_nearest(point, radius_m, timeout),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    pub default_radius_m: f64,
    pub indexed_timeout: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            default_radius_m: DEFAULT_RADIUS_M,
            indexed_timeout: DEFAULT_INDEXED_TIMEOUT,
        }
    }
}

impl ResolverOptions {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.default_radius_m.is_nan() || self.default_radius_m < 0.0 {
            return Err(ConfigError::Invalid {
                field: "default_radius_m",
                value: self.default_radius_m.to_string(),
            });
        }
        Ok(())
    }
}

/// Shared, hot-swappable resolver options. Each resolution reads one snapshot.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptionsHandle {
    inner: Arc<RwLock<ResolverOptions>>,
}

impl ResolverOptionsHandle {
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            inner: Arc::new(RwLock::new(options)),
        }
    }

    pub fn current(&self) -> ResolverOptions {
        self.inner.read().clone()
    }

    pub fn replace(&self, options: ResolverOptions) -> std::result::Result<(), ConfigError> {
        options.validate()?;
        *self.inner.write() = options;
        Ok(())
    }
}

impl From<ResolverOptions> for ResolverOptionsHandle {
    fn from(options: ResolverOptions) -> Self {
        Self::new(options)
    }
}

pub struct ProximityResolver<S, I = NoIndex> {
    source: S,
    indexed: I,
    capability: Arc<CapabilityState>,
    options: ResolverOptionsHandle,
}

impl<S: FacilitySource> ProximityResolver<S, NoIndex> {
    /// A resolver that always scans.
    pub fn linear_only(source: S, options: impl Into<ResolverOptionsHandle>) -> Self {
        Self::with_capability(source, NoIndex, Arc::new(CapabilityState::new()), options)
    }
}

impl<S, I> ProximityResolver<S, I>
where
    S: FacilitySource,
    I: IndexedFacilityLookup,
{
    /// A resolver sharing the process-wide capability state.
    pub fn new(source: S, indexed: I, options: impl Into<ResolverOptionsHandle>) -> Self {
        Self::with_capability(source, indexed, CapabilityState::global(), options)
    }

    pub fn with_capability(
        source: S,
        indexed: I,
        capability: Arc<CapabilityState>,
        options: impl Into<ResolverOptionsHandle>,
    ) -> Self {
        Self {
            source,
            indexed,
            capability,
            options: options.into(),
        }
    }

    pub fn capability(&self) -> &Arc<CapabilityState> {
        &self.capability
    }

    /// Live options; replacing them affects the next resolution.
    pub fn options(&self) -> &ResolverOptionsHandle {
        &self.options
    }

    /// Nearest active facility within the default radius.
    pub fn resolve(&self, point: Coordinate) -> Result<Option<Resolution>> {
        let options = self.options.current();
        self.resolve_within_timeout(point, options.default_radius_m, options.indexed_timeout)
    }

    pub fn resolve_within(&self, point: Coordinate, radius_m: f64) -> Result<Option<Resolution>> {
        self.resolve_within_timeout(point, radius_m, self.options.current().indexed_timeout)
    }

    /// Nearest active facility within `radius_m`, with `timeout` bounding
    /// the indexed query. `Ok(None)` means no facility qualifies.
    pub fn resolve_within_timeout(
        &self,
        point: Coordinate,
        radius_m: f64,
        timeout: Duration,
    ) -> Result<Option<Resolution>> {
        point.validate()?;
        if radius_m.is_nan() || radius_m < 0.0 {
            return Err(TrackingError::InvalidRadius(radius_m));
        }

        if self.indexed_available() {
            let indexed = IndexedStrategy::new(&self.indexed, timeout);
            if let Some(resolution) = self.try_strategy(&indexed, point, radius_m) {
                return Ok(Some(resolution));
            }
        }

        let linear = LinearScanStrategy::new(&self.source);
        Ok(self.try_strategy(&linear, point, radius_m))
    }

    fn try_strategy<T: NearestFacilityStrategy>(
        &self,
        strategy: &T,
        point: Coordinate,
        radius_m: f64,
    ) -> Option<Resolution> {
        let path = strategy.path();
        match strategy.nearest(point, radius_m) {
            Ok(Some(matched)) => {
                debug!(?path, facility_id = %matched.facility.id, distance_m = matched.distance_m, "facility resolved");
                Some(Resolution { matched, path })
            }
            Ok(None) => {
                debug!(?path, radius_m, "no facility within radius");
                None
            }
            Err(err) => {
                match path {
                    ResolvePath::Indexed => {
                        warn!(error = %err, timeout = err.is_timeout(), "indexed facility query failed; scanning")
                    }
                    ResolvePath::LinearScan => error!(error = %err, "facility scan failed"),
                }
                None
            }
        }
    }

    /// Probes on first use; a failed probe counts as unavailable.
    fn indexed_available(&self) -> bool {
        if !self.indexed.is_configured() {
            return false;
        }
        match self.capability.get() {
            Capability::Available => true,
            Capability::Unavailable => false,
            Capability::Unknown => {
                let available = match self.indexed.probe() {
                    Ok(available) => available,
                    Err(err) => {
                        warn!(error = %err, "spatial index probe failed");
                        false
                    }
                };
                info!(available, "spatial index capability probed");
                self.capability.record(available);
                available
            }
        }
    }
}

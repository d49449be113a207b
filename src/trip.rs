//! Daily trip summaries built from stored position samples.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

use crate::error::{Result, TrackingError};
use crate::geo;
use crate::model::{PositionSample, SampleKind, SubjectId};
use crate::traits::{NoLabels, OriginLabelResolver, PositionStore};

#[derive(Debug, Clone, PartialEq)]
pub struct TripPoint {
    pub sample: PositionSample,
    /// Display label of the originating record, when it could be resolved.
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripSummary {
    pub points: Vec<TripPoint>,
    pub speed_kmh: Option<f64>,
    pub traveled_duration: Option<Duration>,
    /// Straight-line distance from first check-in to last check-out.
    pub distance_m: Option<f64>,
    pub any_suspicious: bool,
}

impl TripSummary {
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            speed_kmh: None,
            traveled_duration: None,
            distance_m: None,
            any_suspicious: false,
        }
    }
}

/// UTC instants covering `date` in the given offset, both inclusive.
///
/// Fails for dates whose day does not fit in the representable range.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    let start = date
        .and_time(NaiveTime::MIN)
        .checked_sub_signed(shift)
        .ok_or(TrackingError::InvalidDate(date))?;
    let end = start
        .checked_add_signed(Duration::days(1))
        .and_then(|next| next.checked_sub_signed(Duration::nanoseconds(1)))
        .ok_or(TrackingError::InvalidDate(date))?;
    Ok((start.and_utc(), end.and_utc()))
}

pub struct TripAggregator<P, L = NoLabels> {
    store: P,
    labels: L,
}

impl<P: PositionStore> TripAggregator<P, NoLabels> {
    pub fn new(store: P) -> Self {
        Self::with_labels(store, NoLabels)
    }
}

impl<P, L> TripAggregator<P, L>
where
    P: PositionStore,
    L: OriginLabelResolver,
{
    pub fn with_labels(store: P, labels: L) -> Self {
        Self { store, labels }
    }

    /// Summarize `subject_id`'s samples on `date` in the reporting offset.
    pub fn summarize(&self, subject_id: &SubjectId, date: NaiveDate, offset: FixedOffset) -> Result<TripSummary> {
        let (from, to) = day_bounds(date, offset)?;
        let mut samples = self.store.samples_between(subject_id, from, to)?;
        if samples.is_empty() {
            debug!(subject_id = %subject_id, %date, "no samples for trip date");
            return Ok(TripSummary::empty());
        }
        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        let any_suspicious = samples.iter().any(|s| s.suspicious);

        let first_check_in = samples.iter().find(|s| s.sample_kind == SampleKind::CheckIn);
        let last_check_out = samples.iter().rev().find(|s| s.sample_kind == SampleKind::CheckOut);
        let (speed_kmh, traveled_duration, distance_m) = match (first_check_in, last_check_out) {
            (Some(start), Some(stop)) => travel_metrics(start, stop),
            _ => (None, None, None),
        };

        let points = samples
            .into_iter()
            .map(|sample| {
                let label = self.label_for(&sample);
                TripPoint { sample, label }
            })
            .collect();

        Ok(TripSummary {
            points,
            speed_kmh,
            traveled_duration,
            distance_m,
            any_suspicious,
        })
    }

    fn label_for(&self, sample: &PositionSample) -> Option<String> {
        let origin = sample.origin_ref.as_ref()?;
        match self.labels.label_for(origin) {
            Ok(label) => label,
            Err(err) => {
                warn!(sample_id = sample.id, error = %err, "origin label lookup failed");
                None
            }
        }
    }
}

fn travel_metrics(start: &PositionSample, stop: &PositionSample) -> (Option<f64>, Option<Duration>, Option<f64>) {
    let duration = stop.timestamp - start.timestamp;
    if duration <= Duration::zero() {
        return (None, None, None);
    }
    let distance_m = geo::distance(start.coordinate, stop.coordinate);
    let hours = duration.num_milliseconds() as f64 / 3_600_000.0;
    let speed_kmh = (distance_m / 1000.0) / hours;
    (Some(speed_kmh), Some(duration), Some(distance_m))
}

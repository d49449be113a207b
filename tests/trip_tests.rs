//! Trip summary tests
//!
//! Empty days, check-in/check-out metrics, labels and day boundaries.

mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveDate};

use field_geotrack::geo;
use field_geotrack::ingest::{AnomalyThresholds, IngestOutcome, PositionIngestService, ThresholdsHandle};
use field_geotrack::model::{SampleKind, SubjectId};
use field_geotrack::store::InMemoryPositionStore;
use field_geotrack::trip::{TripAggregator, TripSummary};

use fixtures::*;

struct Harness {
    ingest: PositionIngestService<Arc<InMemoryPositionStore>>,
    trips: TripAggregator<Arc<InMemoryPositionStore>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_thresholds(AnomalyThresholds::default())
    }

    fn with_thresholds(thresholds: AnomalyThresholds) -> Self {
        let store = Arc::new(InMemoryPositionStore::new());
        Self {
            ingest: PositionIngestService::new(Arc::clone(&store), ThresholdsHandle::new(thresholds)),
            trips: TripAggregator::new(store),
        }
    }

    fn push(&self, timestamp: &str, lat: f64, lng: f64, kind: SampleKind) {
        let outcome = self.ingest.ingest(report("E1", timestamp, lat, lng).kind(kind)).unwrap();
        assert!(matches!(outcome, IngestOutcome::Accepted { .. }));
    }

    fn summarize(&self, date: NaiveDate) -> TripSummary {
        self.trips
            .summarize(&SubjectId::new("E1"), date, utc())
            .unwrap()
    }
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn jan_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn empty_day() {
    let harness = Harness::new();
    let summary = harness.summarize(jan_first());
    assert!(summary.points.is_empty());
    assert!(summary.speed_kmh.is_none());
    assert!(summary.traveled_duration.is_none());
    assert!(!summary.any_suspicious);
    assert_eq!(summary, TripSummary::empty());
}

#[test]
fn full_trip() {
    let harness = Harness::new();
    harness.push(&at(9, 0, 0), 12.90, 77.60, SampleKind::CheckIn);
    harness.push(&at(12, 0, 0), 12.93, 77.62, SampleKind::RoutePoint);
    harness.push(&at(17, 0, 0), 12.95, 77.65, SampleKind::CheckOut);

    let summary = harness.summarize(jan_first());
    assert_eq!(summary.points.len(), 3);

    let duration = summary.traveled_duration.unwrap();
    assert_eq!(duration, Duration::hours(8));

    let distance_m = geo::distance(
        field_geotrack::Coordinate::new(12.90, 77.60),
        field_geotrack::Coordinate::new(12.95, 77.65),
    );
    let expected_kmh = (distance_m / 1000.0) / 8.0;
    let speed_kmh = summary.speed_kmh.unwrap();
    assert!((speed_kmh - expected_kmh).abs() < 1e-9, "{} vs {}", speed_kmh, expected_kmh);
    assert!((summary.distance_m.unwrap() - distance_m).abs() < 1e-9);
}

#[test]
fn first_check_in_and_last_check_out_are_used() {
    let harness = Harness::new();
    harness.push(&at(8, 0, 0), 12.90, 77.60, SampleKind::CheckIn);
    harness.push(&at(12, 0, 0), 12.91, 77.60, SampleKind::CheckOut);
    harness.push(&at(13, 0, 0), 12.91, 77.60, SampleKind::CheckIn);
    harness.push(&at(18, 0, 0), 12.92, 77.60, SampleKind::CheckOut);

    let summary = harness.summarize(jan_first());
    assert_eq!(summary.traveled_duration, Some(Duration::hours(10)));
}

#[test]
fn missing_check_out_leaves_metrics_empty() {
    let harness = Harness::new();
    harness.push(&at(9, 0, 0), 12.90, 77.60, SampleKind::CheckIn);
    harness.push(&at(10, 0, 0), 12.91, 77.60, SampleKind::RoutePoint);

    let summary = harness.summarize(jan_first());
    assert_eq!(summary.points.len(), 2);
    assert!(summary.speed_kmh.is_none());
    assert!(summary.traveled_duration.is_none());
}

#[test]
fn check_out_before_check_in_gives_no_metrics() {
    let harness = Harness::new();
    harness.push(&at(9, 0, 0), 12.90, 77.60, SampleKind::CheckOut);
    harness.push(&at(17, 0, 0), 12.95, 77.65, SampleKind::CheckIn);

    let summary = harness.summarize(jan_first());
    assert!(summary.speed_kmh.is_none());
    assert!(summary.traveled_duration.is_none());
}

#[test]
fn points_are_time_ordered_and_flag_suspicious() {
    let harness = Harness::new();
    harness.push(&at(15, 0, 0), 12.95, 77.60, SampleKind::RoutePoint);
    // Arrives late: out of order, so flagged.
    harness.push(&at(10, 0, 0), 12.90, 77.60, SampleKind::RoutePoint);

    let summary = harness.summarize(jan_first());
    let times: Vec<_> = summary.points.iter().map(|p| p.sample.timestamp).collect();
    let mut sorted = times.clone();
    sorted.sort();
    assert_eq!(times, sorted);
    assert!(summary.any_suspicious);
}

#[test]
fn other_days_are_excluded() {
    // Reports one second apart must not collapse into duplicates here.
    let harness = Harness::with_thresholds(AnomalyThresholds {
        dedup_window_s: 0.0,
        ..AnomalyThresholds::default()
    });
    harness.push("2023-12-31T23:59:59Z", 12.90, 77.60, SampleKind::RoutePoint);
    harness.push(&at(0, 0, 0), 12.90, 77.60, SampleKind::RoutePoint);
    harness.push(&at(23, 59, 59), 12.90, 77.60, SampleKind::RoutePoint);
    harness.push("2024-01-02T00:00:00Z", 12.90, 77.60, SampleKind::RoutePoint);

    assert_eq!(harness.summarize(jan_first()).points.len(), 2);
}

#[test]
fn reporting_offset_shifts_the_day() {
    let harness = Harness::new();
    // 20:00 UTC on Dec 31 is 01:30 on Jan 1 in IST.
    harness.push("2023-12-31T20:00:00Z", 12.90, 77.60, SampleKind::RoutePoint);

    let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
    let summary = harness
        .trips
        .summarize(&SubjectId::new("E1"), jan_first(), ist)
        .unwrap();
    assert_eq!(summary.points.len(), 1);
    assert!(harness.summarize(jan_first()).points.is_empty());
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn origin_labels_are_best_effort() {
    let store = Arc::new(InMemoryPositionStore::new());
    let ingest = PositionIngestService::new(Arc::clone(&store), ThresholdsHandle::default());
    ingest
        .ingest(report("E1", &at(9, 0, 0), 12.90, 77.60).origin(task(7)))
        .unwrap();
    ingest
        .ingest(report("E1", &at(10, 0, 0), 12.90, 77.60).origin(task(-1)))
        .unwrap();
    ingest.ingest(report("E1", &at(11, 0, 0), 12.90, 77.60)).unwrap();

    let labels = TaskLabels(HashMap::from([(7, "Install meter".to_string())]));
    let trips = TripAggregator::with_labels(store, labels);
    let summary = trips.summarize(&SubjectId::new("E1"), jan_first(), utc()).unwrap();

    let labels: Vec<_> = summary.points.iter().map(|p| p.label.as_deref()).collect();
    assert_eq!(labels, vec![Some("Install meter"), None, None]);
}

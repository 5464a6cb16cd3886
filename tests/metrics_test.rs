//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use mimir::telemetry;
use mimir::{ManualClock, Mimir};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn lookups_record_hits_and_misses() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let client = Mimir::builder()
            .clock(Arc::new(ManualClock::at_epoch()))
            .build()
            .unwrap();
        client.store("k", b"v".to_vec(), 30, None).unwrap();
        client.lookup("k").unwrap();
        client.lookup("k").unwrap();
        client.lookup("missing").unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::TOKENS_SAVED_TOTAL), 60);
    assert_eq!(counter_total(&snapshot, telemetry::TOKENS_BILLED_TOTAL), 30);
}

#[test]
fn evictions_and_expirations_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let clock = ManualClock::at_epoch();
        let client = Mimir::builder()
            .capacity(2)
            .sweep_interval(0)
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        client.store("a", Vec::<u8>::new(), 0, Some(Duration::from_secs(1))).unwrap();
        client.store("b", Vec::<u8>::new(), 0, Some(Duration::from_secs(1))).unwrap();
        client.store("c", Vec::<u8>::new(), 0, Some(Duration::from_secs(1))).unwrap(); // evicts a
        clock.advance(Duration::from_secs(1));
        client.lookup("b").unwrap(); // lazy expiry
        client.invalidate_expired().unwrap(); // sweeps c
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_EVICTIONS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_EXPIRATIONS_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_SWEEPS_TOTAL), 1);
}

#[test]
fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let client = Mimir::builder().build().unwrap();
    client.store("k", b"v".to_vec(), 1, None).unwrap();
    assert!(client.lookup("k").unwrap().is_hit());
}

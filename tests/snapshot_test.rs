//! Tests for [`SnapshotCodec`]: versioned dump/load of store and ledger.

use std::sync::Arc;
use std::time::Duration;

use mimir::snapshot::{SNAPSHOT_FORMAT, SNAPSHOT_VERSION};
use mimir::{
    CacheConfig, CacheStore, ManualClock, MimirError, SnapshotCodec, UsageLedger, UsageScope,
};

fn config(capacity: usize) -> CacheConfig {
    CacheConfig::new().capacity(capacity).sweep_interval(0)
}

fn populated(clock: &ManualClock) -> (CacheStore, UsageLedger) {
    let mut store = CacheStore::new(config(10), Arc::new(clock.clone())).unwrap();
    let mut ledger = UsageLedger::new(Arc::new(clock.clone()));
    for (i, key) in ["alpha", "beta", "gamma", "delta"].iter().enumerate() {
        store.put(*key, key.as_bytes().to_vec(), i as u64 * 10, None);
        ledger.record_billed(i as u64 * 10, 0.1);
    }
    store.get("beta");
    ledger.record_hit(10, 0.1);
    clock.advance(Duration::from_secs(24 * 3600));
    store.put("epsilon", vec![0xde_u8, 0xad, 0xbe, 0xef], 5, Some(Duration::from_secs(60)));
    ledger.record_billed(5, 0.05);
    (store, ledger)
}

#[test]
fn round_trip_preserves_order_entries_and_ledger() {
    let clock = ManualClock::at_epoch();
    let (store, ledger) = populated(&clock);
    let blob = SnapshotCodec::dump(&store, &ledger).unwrap();
    let (loaded, loaded_ledger) =
        SnapshotCodec::load(&blob, config(10), Arc::new(clock.clone())).unwrap();

    let before: Vec<_> = store.iter_lru().collect();
    let after: Vec<_> = loaded.iter_lru().collect();
    assert_eq!(before, after);

    assert_eq!(loaded_ledger.all_time(), ledger.all_time());
    assert_eq!(loaded_ledger.today(), ledger.today());
    assert_eq!(loaded_ledger.daily_history(), ledger.daily_history());
    assert_eq!(
        loaded_ledger.snapshot(UsageScope::Month),
        ledger.snapshot(UsageScope::Month)
    );
}

#[test]
fn loaded_store_evicts_in_the_same_order() {
    let clock = ManualClock::at_epoch();
    let (mut store, ledger) = populated(&clock);
    let blob = SnapshotCodec::dump(&store, &ledger).unwrap();
    let (mut loaded, _) = SnapshotCodec::load(&blob, config(10), Arc::new(clock)).unwrap();

    let mut evicted_original = Vec::new();
    let mut evicted_loaded = Vec::new();
    for i in 0..10 {
        evicted_original.extend(store.put(format!("n{i}"), Vec::<u8>::new(), 0, None));
        evicted_loaded.extend(loaded.put(format!("n{i}"), Vec::<u8>::new(), 0, None));
    }
    assert_eq!(evicted_original, vec!["alpha", "gamma", "delta", "beta", "epsilon"]);
    assert_eq!(evicted_original, evicted_loaded);
}

#[test]
fn blob_carries_format_and_version() {
    let clock = ManualClock::at_epoch();
    let (store, ledger) = populated(&clock);
    let blob = SnapshotCodec::dump(&store, &ledger).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    assert_eq!(value["format"], SNAPSHOT_FORMAT);
    assert_eq!(value["version"], SNAPSHOT_VERSION);
    assert_eq!(value["cache"]["entries"].as_array().unwrap().len(), 5);
}

#[test]
fn every_truncation_is_rejected() {
    let clock = ManualClock::at_epoch();
    let (store, ledger) = populated(&clock);
    let blob = SnapshotCodec::dump(&store, &ledger).unwrap();
    for len in (0..blob.len()).step_by(17) {
        let result = SnapshotCodec::load(&blob[..len], config(10), Arc::new(clock.clone()));
        assert!(
            matches!(result, Err(MimirError::SnapshotCorrupt(_))),
            "truncation at {len} was accepted"
        );
    }
}

#[test]
fn unversioned_blob_is_rejected() {
    let clock = ManualClock::at_epoch();
    let err = SnapshotCodec::load(
        br#"{"format":"mimir-snapshot","cache":{"entries":[]}}"#,
        config(10),
        Arc::new(clock),
    )
    .unwrap_err();
    assert!(matches!(err, MimirError::SnapshotCorrupt(ref m) if m.contains("version")));
}

#[test]
fn inconsistent_ledger_is_rejected() {
    let clock = ManualClock::at_epoch();
    let (store, ledger) = populated(&clock);
    let blob = SnapshotCodec::dump(&store, &ledger).unwrap();
    let mut value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    value["ledger"]["all_time"]["requests"] = serde_json::json!(1);
    let bytes = serde_json::to_vec(&value).unwrap();
    let err = SnapshotCodec::load(&bytes, config(10), Arc::new(clock)).unwrap_err();
    assert!(matches!(err, MimirError::SnapshotCorrupt(_)));
}

#[test]
fn empty_state_round_trips() {
    let clock = ManualClock::at_epoch();
    let store = CacheStore::new(config(1), Arc::new(clock.clone())).unwrap();
    let ledger = UsageLedger::new(Arc::new(clock.clone()));
    let blob = SnapshotCodec::dump(&store, &ledger).unwrap();
    let (loaded, loaded_ledger) = SnapshotCodec::load(&blob, config(1), Arc::new(clock)).unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded_ledger.all_time().requests, 0);
}

#[test]
fn overflowing_history_is_rejected() {
    let clock = ManualClock::at_epoch();
    let store = CacheStore::new(config(1), Arc::new(clock.clone())).unwrap();
    let ledger = UsageLedger::new(Arc::new(clock.clone()));
    let blob = SnapshotCodec::dump(&store, &ledger).unwrap();
    let mut value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    value["ledger"]["daily_history"] = serde_json::json!({
        "1969-12-30": { "requests": u64::MAX, "tokens_used": 0, "tokens_saved": 0,
                        "cost_billed": 0.0, "cost_saved": 0.0 },
        "1969-12-29": { "requests": 2, "tokens_used": 0, "tokens_saved": 0,
                        "cost_billed": 0.0, "cost_saved": 0.0 },
    });
    let bytes = serde_json::to_vec(&value).unwrap();
    let err = SnapshotCodec::load(&bytes, config(1), Arc::new(clock)).unwrap_err();
    assert!(matches!(err, MimirError::SnapshotCorrupt(ref m) if m.contains("overflow")));
}

#[test]
fn entry_expiry_must_match_ttl() {
    let clock = ManualClock::at_epoch();
    let (store, ledger) = populated(&clock);
    let blob = SnapshotCodec::dump(&store, &ledger).unwrap();
    let mut value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    let last = value["cache"]["entries"].as_array().unwrap().len() - 1;
    // the most recent entry, "epsilon", has a 60s ttl
    value["cache"]["entries"][last]["ttl"] = serde_json::json!({ "secs": 61, "nanos": 0 });
    let bytes = serde_json::to_vec(&value).unwrap();
    let err = SnapshotCodec::load(&bytes, config(10), Arc::new(clock)).unwrap_err();
    assert!(matches!(err, MimirError::SnapshotCorrupt(_)));
}

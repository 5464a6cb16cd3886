//! Tests for snapshot persistence through [`PersistenceBackend`]s.

use std::path::Path;
use std::sync::Arc;

use mimir::persistence::{FsBackend, MemoryBackend, PersistenceBackend};
use mimir::{Lookup, ManualClock, Mimir, MimirBuilder, SnapshotStatus, UsageScope};

fn builder(clock: &ManualClock) -> MimirBuilder {
    Mimir::builder()
        .capacity(8)
        .sweep_interval(0)
        .clock(Arc::new(clock.clone()))
}

// ============================================================================
// FsBackend
// ============================================================================

#[tokio::test]
async fn fs_read_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsBackend::new();
    assert_eq!(backend.read(&dir.path().join("absent.json")).await.unwrap(), None);
}

#[tokio::test]
async fn fs_write_creates_parent_dirs_and_leaves_no_tmp() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("state.json");
    let backend = FsBackend::new();
    backend.write(&path, b"first").await.unwrap();
    backend.write(&path, b"second").await.unwrap();

    assert_eq!(backend.read(&path).await.unwrap().as_deref(), Some(&b"second"[..]));
    let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("state.json")]);
}

#[tokio::test]
async fn save_then_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let clock = ManualClock::at_epoch();
    let backend = FsBackend::new();

    let client = builder(&clock).build().unwrap();
    client.store("k", b"cached".to_vec(), 12, None).unwrap();
    client.lookup("k").unwrap();
    client.save(&backend, &path).await.unwrap();

    let restored = builder(&clock).load_or_default(&backend, &path).await.unwrap();
    let hit = restored.lookup("k").unwrap().hit().unwrap();
    assert_eq!(&*hit.value, b"cached");
    assert_eq!(restored.stats(UsageScope::AllTime).unwrap().usage.requests, 3);
}

#[tokio::test]
async fn corrupt_file_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{\"format\":\"mimir-snapshot\",\"version\":1,").unwrap();
    let clock = ManualClock::at_epoch();

    let client = builder(&clock)
        .load_or_default(&FsBackend::new(), &path)
        .await
        .unwrap();
    assert_eq!(client.cache_summary().unwrap().size, 0);
    assert_eq!(client.stats(UsageScope::AllTime).unwrap().usage.requests, 0);
}

#[tokio::test]
async fn newer_version_is_reported_and_left_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let clock = ManualClock::at_epoch();
    let backend = FsBackend::new();

    let client = builder(&clock).build().unwrap();
    client.store("k", b"v".to_vec(), 1, None).unwrap();
    client.save(&backend, &path).await.unwrap();
    let mut value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    value["version"] = serde_json::json!(2);
    let newer = serde_json::to_vec(&value).unwrap();
    std::fs::write(&path, &newer).unwrap();

    let (client, status) = builder(&clock).load(&backend, &path).await.unwrap();
    assert!(matches!(status, SnapshotStatus::Discarded(ref m) if m.contains("version 2")));
    assert!(!status.allows_overwrite());
    assert_eq!(client.cache_summary().unwrap().size, 0);
    assert_eq!(std::fs::read(&path).unwrap(), newer);
}

#[tokio::test]
async fn load_reports_restored_and_missing() {
    let clock = ManualClock::at_epoch();
    let backend = MemoryBackend::new();
    let path = Path::new("snap");

    let (client, status) = builder(&clock).load(&backend, path).await.unwrap();
    assert_eq!(status, SnapshotStatus::Missing);
    client.store("k", b"v".to_vec(), 1, None).unwrap();
    client.save(&backend, path).await.unwrap();

    let (restored, status) = builder(&clock).load(&backend, path).await.unwrap();
    assert_eq!(status, SnapshotStatus::Restored);
    assert!(status.allows_overwrite());
    assert!(restored.lookup("k").unwrap().is_hit());
}

#[tokio::test]
async fn invalid_capacity_is_reported_before_reading() {
    let backend = MemoryBackend::new();
    let err = Mimir::builder()
        .capacity(0)
        .load_or_default(&backend, Path::new("snap"))
        .await
        .unwrap_err();
    assert!(!err.is_recoverable());
}

// ============================================================================
// MemoryBackend
// ============================================================================

#[tokio::test]
async fn memory_backend_missing_snapshot_starts_fresh() {
    let clock = ManualClock::at_epoch();
    let backend = MemoryBackend::new();
    let client = builder(&clock)
        .load_or_default(&backend, Path::new("nothing-here"))
        .await
        .unwrap();
    assert_eq!(client.lookup("any").unwrap(), Lookup::Miss);
}

#[tokio::test]
async fn independent_clients_share_a_backend() {
    let clock = ManualClock::at_epoch();
    let backend = MemoryBackend::new();

    let first = builder(&clock).build().unwrap();
    let second = builder(&clock).build().unwrap();
    first.store("only-in-first", b"1".to_vec(), 1, None).unwrap();
    second.store("only-in-second", b"2".to_vec(), 1, None).unwrap();
    assert_eq!(first.lookup("only-in-second").unwrap(), Lookup::Miss);

    first.save(&backend, Path::new("first")).await.unwrap();
    second.save(&backend, Path::new("second")).await.unwrap();
    assert_eq!(backend.len().await, 2);

    let reloaded = builder(&clock)
        .load_or_default(&backend, Path::new("second"))
        .await
        .unwrap();
    assert!(reloaded.lookup("only-in-second").unwrap().is_hit());
    assert_eq!(reloaded.lookup("only-in-first").unwrap(), Lookup::Miss);
}

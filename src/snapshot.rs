//! Versioned serialization of cache and ledger state.
//!
//! A snapshot is a JSON document:
//!
//! ```json
//! {
//!   "format": "mimir-snapshot",
//!   "version": 1,
//!   "taken_at": "2025-06-01T09:00:00Z",
//!   "cache": { "counters": { ... }, "entries": [ ... ] },
//!   "ledger": { "day_key": "2025-06-01", ... }
//! }
//! ```
//!
//! Entries are listed least recently used first and their payloads are
//! base64. The `format`/`version` pair is checked before anything else is
//! parsed, so blobs from an incompatible writer are rejected up front.
//!
//! [`SnapshotCodec::load`] builds fresh state and hands it back only once
//! every check has passed. It never touches existing state, so a failed
//! load cannot leave a half-populated store behind.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheConfig, CacheCounters, CacheEntry, CacheStore};
use crate::clock::{Clock, add_saturating};
use crate::ledger::{LedgerState, UsageLedger};
use crate::{MimirError, Result};

/// Format tag written into every snapshot.
pub const SNAPSHOT_FORMAT: &str = "mimir-snapshot";

/// Snapshot layout version this build reads and writes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct Header {
    format: Option<String>,
    version: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct Document {
    format: String,
    version: u32,
    taken_at: DateTime<Utc>,
    cache: CacheSection,
    ledger: LedgerState,
}

#[derive(Serialize, Deserialize)]
struct CacheSection {
    #[serde(default)]
    counters: CacheCounters,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    key: String,
    #[serde(with = "payload")]
    value: Vec<u8>,
    #[serde(default)]
    tokens: u64,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    ttl: Duration,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    hit_count: u64,
}

impl From<&CacheEntry> for PersistedEntry {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key().to_string(),
            value: entry.value().to_vec(),
            tokens: entry.tokens(),
            created_at: entry.created_at(),
            last_accessed_at: entry.last_accessed_at(),
            ttl: entry.ttl(),
            expires_at: entry.expires_at(),
            hit_count: entry.hit_count(),
        }
    }
}

impl From<PersistedEntry> for CacheEntry {
    fn from(p: PersistedEntry) -> Self {
        CacheEntry::restore(
            p.key,
            Arc::from(p.value),
            p.tokens,
            p.created_at,
            p.last_accessed_at,
            p.ttl,
            p.expires_at,
            p.hit_count,
        )
    }
}

mod payload {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 payload: {e}")))
    }
}

/// Encodes and decodes [`CacheStore`] + [`UsageLedger`] state.
pub struct SnapshotCodec;

impl SnapshotCodec {
    /// Serialize the store (entries, recency order, counters) and the
    /// ledger (live buckets and history).
    pub fn dump(store: &CacheStore, ledger: &UsageLedger) -> Result<Vec<u8>> {
        let document = Document {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            taken_at: store.now(),
            cache: CacheSection {
                counters: store.counters(),
                entries: store.iter_lru().map(PersistedEntry::from).collect(),
            },
            ledger: ledger.state().clone(),
        };
        let bytes = serde_json::to_vec(&document)?;
        debug!(
            entries = document.cache.entries.len(),
            bytes = bytes.len(),
            "encoded snapshot"
        );
        Ok(bytes)
    }

    /// Rebuild state from `blob` into a store configured by `config`.
    ///
    /// Any unrecognised, truncated or inconsistent blob is reported as
    /// [`MimirError::SnapshotCorrupt`]. When the snapshot holds more entries
    /// than `config.capacity`, the least recently used ones are dropped.
    pub fn load(
        blob: &[u8],
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(CacheStore, UsageLedger)> {
        let header: Header = serde_json::from_slice(blob).map_err(corrupt)?;
        match header.format.as_deref() {
            Some(SNAPSHOT_FORMAT) => {}
            Some(other) => {
                return Err(MimirError::SnapshotCorrupt(format!(
                    "unexpected format tag '{other}'"
                )));
            }
            None => {
                return Err(MimirError::SnapshotCorrupt("missing format tag".into()));
            }
        }
        match header.version {
            Some(SNAPSHOT_VERSION) => {}
            Some(other) => {
                return Err(MimirError::SnapshotCorrupt(format!(
                    "unsupported snapshot version {other} (expected {SNAPSHOT_VERSION})"
                )));
            }
            None => return Err(MimirError::SnapshotCorrupt("missing version".into())),
        }

        let document: Document = serde_json::from_slice(blob).map_err(corrupt)?;
        validate_entries(&document.cache.entries)?;
        document
            .ledger
            .validate()
            .map_err(MimirError::SnapshotCorrupt)?;

        let entries: Vec<CacheEntry> = document
            .cache
            .entries
            .into_iter()
            .map(CacheEntry::from)
            .collect();
        let (store, dropped) =
            CacheStore::restore(config, Arc::clone(&clock), entries, document.cache.counters)?;
        if dropped > 0 {
            warn!(
                dropped,
                capacity = store.capacity(),
                "snapshot holds more entries than capacity, dropped least recently used"
            );
        }
        let ledger = UsageLedger::from_state(document.ledger, clock);
        debug!(entries = store.len(), taken_at = %document.taken_at, "decoded snapshot");
        Ok((store, ledger))
    }
}

fn validate_entries(entries: &[PersistedEntry]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.key.as_str()) {
            return Err(MimirError::SnapshotCorrupt(format!(
                "duplicate key '{}'",
                entry.key
            )));
        }
        if entry.expires_at != add_saturating(entry.created_at, entry.ttl) {
            return Err(MimirError::SnapshotCorrupt(format!(
                "entry '{}' expiry does not match its creation time and ttl",
                entry.key
            )));
        }
    }
    Ok(())
}

fn corrupt(err: serde_json::Error) -> MimirError {
    MimirError::SnapshotCorrupt(err.to_string())
}

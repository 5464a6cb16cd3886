//! Bounded, time-aware response store.
//!
//! [`CacheStore`] owns the `key → entry` map and the [`EvictionIndex`]
//! that orders those keys by recency. After every public operation the
//! map holds at most `capacity` entries and the index tracks exactly the
//! keys in the map.
//!
//! Expiry is checked two ways:
//!
//! - lazily: [`CacheStore::get`] never returns an entry at or past its
//!   `expires_at`, and removes it on the spot;
//! - in bulk: [`CacheStore::sweep_expired`] scans everything. The
//!   [`MaintenanceScheduler`] triggers a sweep every N counted operations.
//!
//! The store keeps its own [`CacheCounters`] so hit/miss/eviction totals
//! always agree with the events it reported, and mirrors each event to the
//! `metrics` facade (see [`telemetry`](crate::telemetry)).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entry::CacheEntry;
use super::index::EvictionIndex;
use super::maintenance::MaintenanceScheduler;
use super::pattern::PatternCache;
use crate::clock::Clock;
use crate::telemetry;
use crate::{MimirError, Result};

/// Default maximum number of live entries.
pub const DEFAULT_CAPACITY: usize = 1_000;

/// Default time-to-live for entries stored without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Default number of operations between automatic sweeps.
pub const DEFAULT_SWEEP_INTERVAL: u64 = 100;

/// Configuration for a [`CacheStore`].
///
/// ```rust
/// # use mimir::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .capacity(500)
///     .default_ttl(Duration::from_secs(3600))
///     .sweep_interval(50);
/// assert_eq!(config.capacity, 500);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of live entries. Must be > 0. Default: 1,000.
    pub capacity: usize,
    /// TTL applied when `put` is called without one. Default: 24 hours.
    pub default_ttl: Duration,
    /// Sweep expired entries every N counted operations; 0 disables.
    /// Default: 100.
    pub sweep_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live entries.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the default time-to-live.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the automatic sweep interval (0 disables).
    pub fn sweep_interval(mut self, interval: u64) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Reject configurations the store cannot exist in.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MimirError::CapacityConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Running totals of the events a store has reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    /// Lookups that returned a value.
    pub hits: u64,
    /// Lookups that found nothing live (absent or expired).
    pub misses: u64,
    /// Successful `put` calls.
    pub saves: u64,
    /// Entries removed to make room for a new key.
    pub evictions: u64,
    /// Entries removed because their TTL had elapsed.
    pub expirations: u64,
}

impl CacheCounters {
    /// Total lookups (hits + misses).
    pub fn lookups(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }

    /// Fraction of lookups that hit, 0.0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

/// Read-only summary of the store's occupancy.
///
/// `active_count + expired_count == size` always holds, and an entry is
/// counted as expired exactly when `get` would treat it as a miss.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheInfo {
    pub size: usize,
    pub capacity: usize,
    /// `size / capacity`, in `0.0..=1.0`.
    pub utilization_ratio: f64,
    pub active_count: usize,
    /// Present but already past `expires_at`, not yet swept.
    pub expired_count: usize,
    /// Creation time of the oldest entry, if any.
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Creation time of the newest entry, if any.
    pub newest_entry: Option<DateTime<Utc>>,
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// Cached payload, shared with the entry.
    pub value: Arc<[u8]>,
    /// Token count recorded with the entry.
    pub tokens: u64,
    /// Hit count after this lookup.
    pub hit_count: u64,
}

/// Bounded LRU + TTL store of cached responses.
#[derive(Debug)]
pub struct CacheStore {
    config: CacheConfig,
    entries: HashMap<String, CacheEntry>,
    index: EvictionIndex,
    scheduler: MaintenanceScheduler,
    counters: CacheCounters,
    patterns: PatternCache,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Create an empty store.
    ///
    /// Fails with [`MimirError::CapacityConfig`] when `capacity` is 0.
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: HashMap::with_capacity(config.capacity.min(4_096)),
            index: EvictionIndex::with_capacity(config.capacity.min(4_096)),
            scheduler: MaintenanceScheduler::new(config.sweep_interval),
            counters: CacheCounters::default(),
            patterns: PatternCache::new(),
            config,
            clock,
        })
    }

    /// Look up `key`.
    ///
    /// On a hit the key becomes most recently used and its hit count goes
    /// up. An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<CacheHit> {
        let now = self.clock.now();
        let expired = self.entries.get(key).map(|e| e.is_expired_at(now));
        let result = match expired {
            Some(false) => {
                self.index.touch(key);
                self.entries.get_mut(key).map(|entry| {
                    entry.record_hit(now);
                    CacheHit {
                        value: entry.shared_value(),
                        tokens: entry.tokens(),
                        hit_count: entry.hit_count(),
                    }
                })
            }
            Some(true) => {
                debug!(key = %short_key(key), "cache entry expired, removing");
                self.remove_entry(key);
                self.counters.expirations = self.counters.expirations.saturating_add(1);
                metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL).increment(1);
                None
            }
            None => None,
        };

        if result.is_some() {
            self.counters.hits = self.counters.hits.saturating_add(1);
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        } else {
            self.counters.misses = self.counters.misses.saturating_add(1);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        }

        self.after_operation();
        result
    }

    /// Store `value` under `key`, using the default TTL when `ttl` is `None`.
    ///
    /// An existing key is replaced outright (fresh timestamps, hit count
    /// back to 0). Inserting a new key into a full store first evicts the
    /// least recently used entry; its key is returned.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Arc<[u8]>>,
        tokens: u64,
        ttl: Option<Duration>,
    ) -> Option<String> {
        let key = key.into();
        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        let mut evicted = None;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.capacity {
            evicted = self.evict_lru();
        }

        let entry = CacheEntry::new(key.clone(), value.into(), tokens, ttl, now);
        self.index.insert(&key);
        self.entries.insert(key, entry);
        self.counters.saves = self.counters.saves.saturating_add(1);

        self.after_operation();
        evicted
    }

    /// Remove `key`. Returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key);
        self.after_operation();
        removed
    }

    /// Remove every entry whose key contains a match for `pattern`.
    ///
    /// Matching is a regex *search* over the raw key, so `"weather"`
    /// removes both `weather:seoul` and `news:weather_today`. Anchor the
    /// pattern (`^...$`) for a full-key match. An invalid pattern returns
    /// [`MimirError::InvalidPattern`] and removes nothing.
    pub fn delete_by_pattern(&mut self, pattern: &str) -> Result<usize> {
        let regex = self.patterns.compile(pattern)?;
        let matching: Vec<String> = self
            .index
            .iter_lru()
            .filter(|key| regex.is_match(key))
            .map(str::to_string)
            .collect();
        for key in &matching {
            self.remove_entry(key);
        }
        debug!(pattern, removed = matching.len(), "pattern invalidation");
        self.after_operation();
        Ok(matching.len())
    }

    /// Remove entries created more than `age` ago, whatever their TTL.
    pub fn delete_older_than(&mut self, age: Duration) -> usize {
        let cutoff = TimeDelta::from_std(age)
            .ok()
            .and_then(|age| self.clock.now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = self.entries.len();
        let index = &mut self.index;
        self.entries.retain(|key, entry| {
            let keep = entry.created_at() >= cutoff;
            if !keep {
                index.remove(key);
            }
            keep
        });
        let removed = before - self.entries.len();
        self.after_operation();
        removed
    }

    /// Remove every entry with `expires_at <= now`. Returns how many went.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        let index = &mut self.index;
        self.entries.retain(|key, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                index.remove(key);
            }
            keep
        });
        let removed = before - self.entries.len();
        self.counters.expirations = self.counters.expirations.saturating_add(removed as u64);
        metrics::counter!(telemetry::CACHE_SWEEPS_TOTAL).increment(1);
        if removed > 0 {
            metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL).increment(removed as u64);
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Occupancy summary, consistent with what `get` would decide now.
    pub fn info(&self) -> CacheInfo {
        let now = self.clock.now();
        let size = self.entries.len();
        let expired_count = self
            .entries
            .values()
            .filter(|e| e.is_expired_at(now))
            .count();
        CacheInfo {
            size,
            capacity: self.config.capacity,
            utilization_ratio: size as f64 / self.config.capacity as f64,
            active_count: size - expired_count,
            expired_count,
            oldest_entry: self.entries.values().map(CacheEntry::created_at).min(),
            newest_entry: self.entries.values().map(CacheEntry::created_at).max(),
        }
    }

    /// Event totals since the store was created (or restored).
    pub fn counters(&self) -> CacheCounters {
        self.counters
    }

    /// Inspect an entry without touching recency, hit count or expiry.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Entries from least to most recently used.
    pub fn iter_lru(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        self.index
            .iter_lru()
            .filter_map(move |key| self.entries.get(key))
    }

    /// Number of entries present (live or not yet swept).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &MaintenanceScheduler {
        &self.scheduler
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Rebuild a store from entries listed least recently used first.
    ///
    /// If there are more entries than `config.capacity`, the least recently
    /// used ones are dropped; the second element is how many.
    pub(crate) fn restore(
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        entries: Vec<CacheEntry>,
        counters: CacheCounters,
    ) -> Result<(Self, usize)> {
        let mut store = Self::new(config, clock)?;
        store.counters = counters;
        for entry in entries {
            store.index.insert(entry.key());
            store.entries.insert(entry.key().to_string(), entry);
        }
        let mut dropped = 0;
        while store.entries.len() > store.config.capacity {
            match store.index.pop_lru() {
                Some(key) => {
                    store.entries.remove(&key);
                    dropped += 1;
                }
                None => break,
            }
        }
        Ok((store, dropped))
    }

    // -- private helpers ---------------------------------------------------

    fn remove_entry(&mut self, key: &str) -> bool {
        self.index.remove(key);
        self.entries.remove(key).is_some()
    }

    fn evict_lru(&mut self) -> Option<String> {
        let key = self.index.pop_lru()?;
        self.entries.remove(&key);
        self.counters.evictions = self.counters.evictions.saturating_add(1);
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
        debug!(key = %short_key(&key), "evicting LRU cache entry");
        Some(key)
    }

    fn after_operation(&mut self) {
        if self.scheduler.record_operation() {
            self.sweep_expired();
        }
    }
}

/// First 8 characters of a key, for log fields.
pub(crate) fn short_key(key: &str) -> &str {
    match key.char_indices().nth(8) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}

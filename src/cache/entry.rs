//! A single cached response.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::add_saturating;

/// One cached response plus its recency and expiry metadata.
///
/// `value`, `tokens`, `created_at`, `ttl` and `expires_at` are fixed when
/// the entry is created. Only a successful lookup touches the entry again,
/// and then only `last_accessed_at` and `hit_count`. Expiry is absolute:
/// reading an entry never pushes `expires_at` out.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    key: String,
    value: Arc<[u8]>,
    tokens: u64,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    ttl: Duration,
    expires_at: DateTime<Utc>,
    hit_count: u64,
}

impl CacheEntry {
    pub(crate) fn new(
        key: String,
        value: Arc<[u8]>,
        tokens: u64,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            value,
            tokens,
            created_at: now,
            last_accessed_at: now,
            ttl,
            expires_at: add_saturating(now, ttl),
            hit_count: 0,
        }
    }

    /// Rebuild an entry from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        key: String,
        value: Arc<[u8]>,
        tokens: u64,
        created_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
        ttl: Duration,
        expires_at: DateTime<Utc>,
        hit_count: u64,
    ) -> Self {
        Self {
            key,
            value,
            tokens,
            created_at,
            last_accessed_at,
            ttl,
            expires_at,
            hit_count,
        }
    }

    /// Request fingerprint this entry is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The cached payload, exactly as stored.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub(crate) fn shared_value(&self) -> Arc<[u8]> {
        Arc::clone(&self.value)
    }

    /// Token count of the cached response; what a hit saves.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Successful lookups since the entry was (re)inserted.
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// An entry is expired from `expires_at` onwards, so a zero TTL is
    /// expired the instant it is created.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub(crate) fn record_hit(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
        self.hit_count = self.hit_count.saturating_add(1);
    }
}

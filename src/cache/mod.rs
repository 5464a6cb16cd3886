//! Response cache.
//!
//! - [`CacheStore`] - bounded `key → response` map with LRU eviction,
//!   absolute per-entry TTL, pattern invalidation and expiry sweeps.
//! - [`EvictionIndex`] - the O(1) recency list the store evicts from.
//! - [`MaintenanceScheduler`] - fires a sweep every N store operations.
//! - [`PatternCache`] - memoised regex compilation for pattern deletes.
//!
//! The store is a plain `&mut self` structure; callers that share it across
//! threads wrap it in a mutex (as [`CachingClient`](crate::CachingClient)
//! does).

pub mod entry;
pub mod index;
pub mod maintenance;
pub mod pattern;
pub mod store;

pub use entry::CacheEntry;
pub use index::EvictionIndex;
pub use maintenance::MaintenanceScheduler;
pub use pattern::PatternCache;
pub use store::{CacheConfig, CacheCounters, CacheHit, CacheInfo, CacheStore};

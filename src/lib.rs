//! Mimir - response cache and usage ledger for LLM API clients
//!
//! This crate sits between an application and a language-model API. It
//! keeps a bounded, time-aware cache of responses keyed by request
//! fingerprint, and a ledger of what was billed and what the cache saved.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use mimir::{Lookup, Mimir, UsageScope};
//!
//! let client = Mimir::builder()
//!     .capacity(2)
//!     .default_ttl(Duration::from_secs(3600))
//!     .cost_per_token(0.001)
//!     .build()?;
//!
//! client.store("A", b"a".to_vec(), 10, None)?;
//! client.store("B", b"b".to_vec(), 10, None)?;
//! assert!(client.lookup("A")?.is_hit()); // A is now most recently used
//! client.store("C", b"c".to_vec(), 10, None)?; // evicts B
//!
//! assert_eq!(client.lookup("B")?, Lookup::Miss);
//! let today = client.stats(UsageScope::Today)?;
//! assert_eq!(today.usage.tokens_saved, 10);
//! # Ok::<(), mimir::MimirError>(())
//! ```
//!
//! # Persistence
//!
//! [`CachingClient::export_state`] / [`CachingClient::import_state`] move
//! the whole state as a versioned blob; [`MimirBuilder::load_or_default`]
//! and [`CachingClient::save`] do the same through a
//! [`PersistenceBackend`](persistence::PersistenceBackend).

pub mod cache;
pub mod client;
pub mod clock;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod ledger;
pub mod persistence;
pub mod plan;
pub mod snapshot;
pub mod telemetry;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheCounters, CacheInfo, CacheStore};
pub use client::{
    CacheSnapshot, CachingClient, FixedRate, HitResult, Lookup, Mimir, MimirBuilder, RateProvider,
    SnapshotStatus,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MimirError, Result};
pub use ledger::{MonthlyProjection, UsageBucket, UsageLedger, UsageScope, UsageSnapshot};
pub use plan::{PlanStatus, UsagePlan};
pub use snapshot::SnapshotCodec;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

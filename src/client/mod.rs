//! Client surface over the cache and usage ledger.
//!
//! [`Mimir::builder()`] configures and builds a [`CachingClient`]. The
//! client is what an upstream API caller talks to: look up a fingerprint,
//! and on a miss make the real call and [`store`](CachingClient::store)
//! the result.
//!
//! ```rust
//! use mimir::{Lookup, Mimir};
//!
//! let client = Mimir::builder().capacity(100).cost_per_token(0.00002).build()?;
//! if let Lookup::Miss = client.lookup("req:1234")? {
//!     client.store("req:1234", b"response".to_vec(), 150, None)?;
//! }
//! assert!(client.lookup("req:1234")?.is_hit());
//! # Ok::<(), mimir::MimirError>(())
//! ```

mod builder;
mod caching;
mod rates;

pub use builder::{Mimir, MimirBuilder, SnapshotStatus};
pub use caching::{CacheSnapshot, CachingClient, HitResult, Lookup};
pub use rates::{FixedRate, RateProvider};

//! Builder for configuring caching clients

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::CachingClient;
use super::rates::{FixedRate, RateProvider};
use crate::cache::CacheConfig;
use crate::clock::{Clock, SystemClock};
use crate::persistence::PersistenceBackend;
use crate::plan::UsagePlan;
use crate::{MimirError, Result};

/// Main entry point for creating caching clients.
pub struct Mimir;

impl Mimir {
    /// Create a new builder for configuring a client.
    pub fn builder() -> MimirBuilder {
        MimirBuilder::new()
    }
}

/// Builder for configuring a [`CachingClient`].
pub struct MimirBuilder {
    cache: CacheConfig,
    clock: Arc<dyn Clock>,
    rates: Arc<dyn RateProvider>,
    plan: UsagePlan,
}

impl Default for MimirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MimirBuilder {
    pub fn new() -> Self {
        Self {
            cache: CacheConfig::default(),
            clock: Arc::new(SystemClock),
            rates: Arc::new(FixedRate::default()),
            plan: UsagePlan::default(),
        }
    }

    /// Maximum number of cached responses (default: 1,000).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.cache.capacity = capacity;
        self
    }

    /// TTL for responses stored without one (default: 24 hours).
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.cache.default_ttl = ttl;
        self
    }

    /// Sweep expired entries every `interval` cache operations; 0 disables
    /// automatic sweeps (default: 100).
    pub fn sweep_interval(mut self, interval: u64) -> Self {
        self.cache.sweep_interval = interval;
        self
    }

    /// Replace the whole cache configuration.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Time source for expiry and rollover (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Billing-rate collaborator (default: zero cost per token).
    pub fn rates(mut self, rates: impl RateProvider + 'static) -> Self {
        self.rates = Arc::new(rates);
        self
    }

    /// Shorthand for `rates(FixedRate::new(cost))`.
    pub fn cost_per_token(self, cost: f64) -> Self {
        self.rates(FixedRate::new(cost))
    }

    /// Usage plan checked by [`CachingClient::plan_status`] (default: free).
    pub fn plan(mut self, plan: UsagePlan) -> Self {
        self.plan = plan;
        self
    }

    /// Build an empty client.
    ///
    /// Fails with [`MimirError::CapacityConfig`] when capacity is 0.
    pub fn build(self) -> Result<CachingClient> {
        CachingClient::new(self.cache, self.clock, self.rates, self.plan)
    }

    /// Build a client and restore it from the snapshot at `path`.
    ///
    /// A missing snapshot gives an empty client. A corrupt one is logged
    /// and also gives an empty client; other read errors are returned.
    pub async fn load_or_default(
        self,
        backend: &dyn PersistenceBackend,
        path: &Path,
    ) -> Result<CachingClient> {
        let (client, _) = self.load(backend, path).await?;
        Ok(client)
    }

    /// Like [`load_or_default`](Self::load_or_default), but also reports
    /// what happened to the snapshot.
    ///
    /// Callers that write state back should check
    /// [`SnapshotStatus::allows_overwrite`] first: after a discarded
    /// snapshot, saving would replace a file this build could not read.
    pub async fn load(
        self,
        backend: &dyn PersistenceBackend,
        path: &Path,
    ) -> Result<(CachingClient, SnapshotStatus)> {
        let client = self.build()?;
        let Some(blob) = backend.read(path).await? else {
            info!(path = %path.display(), "no cache snapshot, starting fresh");
            return Ok((client, SnapshotStatus::Missing));
        };
        match client.import_state(&blob) {
            Ok(()) => {
                info!(path = %path.display(), bytes = blob.len(), "loaded cache snapshot");
                Ok((client, SnapshotStatus::Restored))
            }
            Err(MimirError::SnapshotCorrupt(reason)) => {
                warn!(
                    path = %path.display(),
                    %reason,
                    "corrupt cache snapshot, starting with an empty cache and ledger"
                );
                Ok((client, SnapshotStatus::Discarded(reason)))
            }
            Err(e) => Err(e),
        }
    }
}

/// Outcome of reading a snapshot in [`MimirBuilder::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// State was restored from the snapshot.
    Restored,
    /// No snapshot existed.
    Missing,
    /// A snapshot existed but was rejected; the client started empty.
    Discarded(String),
}

impl SnapshotStatus {
    /// Whether saving over the snapshot keeps everything it held.
    pub fn allows_overwrite(&self) -> bool {
        !matches!(self, SnapshotStatus::Discarded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let client = Mimir::builder().build().unwrap();
        assert_eq!(client.config(), &CacheConfig::default());
        assert_eq!(client.plan(), &UsagePlan::free());
    }

    #[test]
    fn zero_capacity_fails() {
        let err = Mimir::builder().capacity(0).build().unwrap_err();
        assert!(matches!(err, MimirError::CapacityConfig(_)));
    }

    #[test]
    fn only_discarded_snapshots_block_overwrite() {
        assert!(SnapshotStatus::Restored.allows_overwrite());
        assert!(SnapshotStatus::Missing.allows_overwrite());
        assert!(!SnapshotStatus::Discarded("bad".into()).allows_overwrite());
    }
}

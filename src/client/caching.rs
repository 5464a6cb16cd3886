//! CachingClient - the cache and ledger behind one shared handle.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info};

use super::rates::RateProvider;
use crate::cache::{CacheConfig, CacheCounters, CacheInfo, CacheStore};
use crate::clock::Clock;
use crate::ledger::{MonthlyProjection, UsageBucket, UsageLedger, UsageScope, UsageSnapshot};
use crate::persistence::PersistenceBackend;
use crate::plan::{PlanStatus, UsagePlan};
use crate::snapshot::SnapshotCodec;
use crate::{MimirError, Result};

/// Outcome of [`CachingClient::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(HitResult),
    Miss,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    /// The hit, if any.
    pub fn hit(self) -> Option<HitResult> {
        match self {
            Lookup::Hit(hit) => Some(hit),
            Lookup::Miss => None,
        }
    }
}

/// A response served from cache.
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub value: Arc<[u8]>,
    /// Tokens the upstream call would have billed.
    pub tokens_saved: u64,
}

/// Occupancy summary returned by [`CachingClient::cache_summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheSnapshot {
    pub size: usize,
    pub capacity: usize,
    pub active: usize,
    pub expired: usize,
}

impl From<&CacheInfo> for CacheSnapshot {
    fn from(info: &CacheInfo) -> Self {
        Self {
            size: info.size,
            capacity: info.capacity,
            active: info.active_count,
            expired: info.expired_count,
        }
    }
}

/// Response cache plus usage ledger for one upstream API client.
///
/// Store and ledger sit behind separate mutexes. A lookup updates the
/// store, releases it, then records into the ledger; the two are never
/// held at once except while exporting or importing state, where the store
/// is always locked first.
pub struct CachingClient {
    cache: Mutex<CacheStore>,
    ledger: Mutex<UsageLedger>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    rates: Arc<dyn RateProvider>,
    plan: UsagePlan,
}

impl std::fmt::Debug for CachingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingClient")
            .field("config", &self.config)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl CachingClient {
    pub(crate) fn new(
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        rates: Arc<dyn RateProvider>,
        plan: UsagePlan,
    ) -> Result<Self> {
        let store = CacheStore::new(config.clone(), Arc::clone(&clock))?;
        let ledger = UsageLedger::new(Arc::clone(&clock));
        Ok(Self {
            cache: Mutex::new(store),
            ledger: Mutex::new(ledger),
            config,
            clock,
            rates,
            plan,
        })
    }

    // =========================================================================
    // Lookup / store
    // =========================================================================

    /// Look up a cached response by request fingerprint.
    ///
    /// A hit is recorded in the ledger as saved usage, priced at the
    /// current rate.
    pub fn lookup(&self, key: &str) -> Result<Lookup> {
        let hit = self.lock_cache()?.get(key);
        let Some(hit) = hit else {
            return Ok(Lookup::Miss);
        };
        let cost_saved = self.price(hit.tokens);
        self.lock_ledger()?.record_hit(hit.tokens, cost_saved);
        Ok(Lookup::Hit(HitResult {
            value: hit.value,
            tokens_saved: hit.tokens,
        }))
    }

    /// Cache a fresh upstream response and record its billed usage.
    ///
    /// `ttl` falls back to the configured default.
    pub fn store(
        &self,
        key: impl Into<String>,
        value: impl Into<Arc<[u8]>>,
        tokens: u64,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.lock_cache()?.put(key, value, tokens, ttl);
        let cost_billed = self.price(tokens);
        self.lock_ledger()?.record_billed(tokens, cost_billed);
        Ok(())
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    pub fn invalidate(&self, key: &str) -> Result<bool> {
        Ok(self.lock_cache()?.delete(key))
    }

    /// Remove every entry whose key contains a match for `pattern`.
    pub fn invalidate_matching(&self, pattern: &str) -> Result<usize> {
        self.lock_cache()?.delete_by_pattern(pattern)
    }

    pub fn invalidate_expired(&self) -> Result<usize> {
        Ok(self.lock_cache()?.sweep_expired())
    }

    /// Remove entries created more than `age` ago.
    pub fn invalidate_older_than(&self, age: Duration) -> Result<usize> {
        Ok(self.lock_cache()?.delete_older_than(age))
    }

    /// Empty the cache. Usage counters are kept.
    pub fn invalidate_all(&self) -> Result<()> {
        self.lock_cache()?.clear();
        Ok(())
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    pub fn stats(&self, scope: UsageScope) -> Result<UsageSnapshot> {
        Ok(self.lock_ledger()?.snapshot(scope))
    }

    /// Usage over the last `days` UTC days, today included.
    pub fn recent_usage(&self, days: u32) -> Result<UsageBucket> {
        Ok(self.lock_ledger()?.recent_days(days))
    }

    /// This month's savings per day so far, projected over 30 days.
    pub fn month_projection(&self) -> Result<MonthlyProjection> {
        Ok(self.lock_ledger()?.month_projection())
    }

    pub fn cache_summary(&self) -> Result<CacheSnapshot> {
        Ok(CacheSnapshot::from(&self.cache_info()?))
    }

    /// Detailed occupancy, including oldest/newest entry times.
    pub fn cache_info(&self) -> Result<CacheInfo> {
        Ok(self.lock_cache()?.info())
    }

    pub fn counters(&self) -> Result<CacheCounters> {
        Ok(self.lock_cache()?.counters())
    }

    /// This month's request count checked against the configured plan.
    pub fn plan_status(&self) -> Result<PlanStatus> {
        let used = self.lock_ledger()?.this_month().requests;
        Ok(self.plan.check(used))
    }

    pub fn plan(&self) -> &UsagePlan {
        &self.plan
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // =========================================================================
    // State transfer
    // =========================================================================

    /// Serialize cache and ledger into a snapshot blob.
    pub fn export_state(&self) -> Result<Vec<u8>> {
        let cache = self.lock_cache()?;
        let ledger = self.lock_ledger()?;
        SnapshotCodec::dump(&cache, &ledger)
    }

    /// Replace cache and ledger with the contents of `blob`.
    ///
    /// On any error the client is left exactly as it was.
    pub fn import_state(&self, blob: &[u8]) -> Result<()> {
        let (store, ledger) =
            SnapshotCodec::load(blob, self.config.clone(), Arc::clone(&self.clock))?;
        let mut cache_guard = self.lock_cache()?;
        let mut ledger_guard = self.lock_ledger()?;
        *cache_guard = store;
        *ledger_guard = ledger;
        debug!(entries = cache_guard.len(), "imported cache state");
        Ok(())
    }

    /// Write [`export_state`](Self::export_state) to `path` through `backend`.
    pub async fn save(&self, backend: &dyn PersistenceBackend, path: &Path) -> Result<()> {
        let blob = self.export_state()?;
        backend.write(path, &blob).await?;
        info!(path = %path.display(), bytes = blob.len(), "saved cache snapshot");
        Ok(())
    }

    // -- private helpers ------------------------------------------------------

    fn price(&self, tokens: u64) -> f64 {
        tokens as f64 * self.rates.cost_per_token()
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, CacheStore>> {
        self.cache
            .lock()
            .map_err(|e| MimirError::LockPoisoned(format!("cache store: {e}")))
    }

    fn lock_ledger(&self) -> Result<MutexGuard<'_, UsageLedger>> {
        self.ledger
            .lock()
            .map_err(|e| MimirError::LockPoisoned(format!("usage ledger: {e}")))
    }
}

//! Telemetry metric name constants.
//!
//! Centralised metric names for mimir operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mimir_`. Counters end in `_total`.

/// Lookups that returned a cached response.
pub const CACHE_HITS_TOTAL: &str = "mimir_cache_hits_total";

/// Lookups that found nothing live.
pub const CACHE_MISSES_TOTAL: &str = "mimir_cache_misses_total";

/// Entries evicted to stay within capacity.
pub const CACHE_EVICTIONS_TOTAL: &str = "mimir_cache_evictions_total";

/// Entries removed because their TTL elapsed (lazily or by a sweep).
pub const CACHE_EXPIRATIONS_TOTAL: &str = "mimir_cache_expirations_total";

/// Expiry sweeps run, manual or scheduled.
pub const CACHE_SWEEPS_TOTAL: &str = "mimir_cache_sweeps_total";

/// Tokens not billed thanks to cache hits.
pub const TOKENS_SAVED_TOTAL: &str = "mimir_tokens_saved_total";

/// Tokens billed by the upstream API on cache misses.
pub const TOKENS_BILLED_TOTAL: &str = "mimir_tokens_billed_total";

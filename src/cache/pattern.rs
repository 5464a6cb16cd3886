//! Compiled-pattern memo for pattern invalidation.
//!
//! Compiled patterns are kept in a small moka cache keyed on the pattern
//! text, so repeated invalidations with `"^weather:"` or a model name
//! compile once. Rejected patterns are never cached.

use moka::sync::Cache;
use regex::Regex;

use crate::{MimirError, Result};

/// Default number of compiled patterns kept around.
const DEFAULT_MAX_PATTERNS: u64 = 64;

/// Bounded cache of compiled regular expressions, keyed on the source text.
#[derive(Clone)]
pub struct PatternCache {
    compiled: Cache<String, Regex>,
}

impl PatternCache {
    /// Create a cache with the default capacity (64 patterns).
    pub fn new() -> Self {
        Self::with_max_patterns(DEFAULT_MAX_PATTERNS)
    }

    /// Create a cache holding at most `max` compiled patterns.
    pub fn with_max_patterns(max: u64) -> Self {
        Self {
            compiled: Cache::new(max),
        }
    }

    /// Compile `pattern`, reusing a previous compilation when available.
    ///
    /// Returns [`MimirError::InvalidPattern`] for syntactically invalid
    /// (or oversized) patterns.
    pub fn compile(&self, pattern: &str) -> Result<Regex> {
        if let Some(regex) = self.compiled.get(pattern) {
            return Ok(regex);
        }
        let regex = Regex::new(pattern).map_err(|e| MimirError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.compiled.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCache")
            .field("entries", &self.compiled.entry_count())
            .finish()
    }
}

//! Mimir error types

/// Mimir error types
#[derive(Debug, thiserror::Error)]
pub enum MimirError {
    // Caller input errors
    /// Malformed regular expression passed to pattern invalidation.
    /// Nothing was deleted.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // Persisted state errors
    /// Snapshot blob is unversioned, truncated, or structurally invalid.
    /// The target store was not modified.
    #[error("snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    // Configuration errors
    #[error("invalid cache capacity: {0}")]
    CapacityConfig(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // Infrastructure errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl MimirError {
    /// Whether the caller can carry on after this error.
    ///
    /// Pattern and snapshot errors leave state untouched, so the caller can
    /// fall back to an uncached path or a fresh store. Capacity errors mean
    /// the store was never built.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MimirError::InvalidPattern { .. }
            | MimirError::SnapshotCorrupt(_)
            | MimirError::Io(_) => true,
            MimirError::CapacityConfig(_)
            | MimirError::Configuration(_)
            | MimirError::Json(_)
            | MimirError::LockPoisoned(_) => false,
        }
    }
}

/// Result type alias for Mimir operations
pub type Result<T> = std::result::Result<T, MimirError>;

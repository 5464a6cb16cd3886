use mimir::{MimirError, Result};

#[test]
fn test_error_display() {
    let err = MimirError::InvalidPattern {
        pattern: "a(".to_string(),
        reason: "unclosed group".to_string(),
    };
    assert!(err.to_string().contains("a("));
    assert!(err.to_string().contains("unclosed group"));
}

#[test]
fn test_snapshot_corrupt_display() {
    let err = MimirError::SnapshotCorrupt("missing version".into());
    assert!(err.to_string().contains("snapshot corrupt"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(MimirError::CapacityConfig("zero".into()))
    }
    assert!(returns_error().is_err());
}

#[test]
fn test_io_error_converts() {
    fn read() -> Result<String> {
        Ok(std::fs::read_to_string("/nonexistent/mimir/file")?)
    }
    assert!(matches!(read(), Err(MimirError::Io(_))));
}

// ============================================================================
// Recoverability classification
// ============================================================================

#[test]
fn recoverable_errors() {
    assert!(
        MimirError::InvalidPattern {
            pattern: "(".into(),
            reason: "x".into()
        }
        .is_recoverable()
    );
    assert!(MimirError::SnapshotCorrupt("truncated".into()).is_recoverable());
    assert!(MimirError::Io(std::io::Error::other("disk")).is_recoverable());
}

#[test]
fn fatal_errors() {
    assert!(!MimirError::CapacityConfig("zero".into()).is_recoverable());
    assert!(!MimirError::Configuration("bad".into()).is_recoverable());
    assert!(!MimirError::LockPoisoned("cache".into()).is_recoverable());
}

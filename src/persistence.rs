//! Byte-oriented storage for snapshots.
//!
//! The codec only produces and consumes blobs; where they live is decided
//! by a [`PersistenceBackend`]. Two are provided:
//!
//! - [`FsBackend`] writes files through `tokio::fs`, atomically (tmp + rename).
//! - [`MemoryBackend`] keeps blobs in a map, for tests and embedding.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{MimirError, Result};

/// Storage for opaque snapshot blobs.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Read the blob at `path`; `Ok(None)` when nothing is stored there.
    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Store `bytes` at `path`, replacing any previous blob.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Filesystem backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBackend;

impl FsBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PersistenceBackend for FsBackend {
    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MimirError::Io(e)),
        }
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling tmp file first, then rename over the target
        let tmp_path = tmp_path_for(path);
        tokio::fs::write(&tmp_path, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(MimirError::Io(e));
        }
        debug!(path = %path.display(), bytes = bytes.len(), "wrote snapshot file");
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// In-memory backend. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    blobs: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Remove the blob at `path`, returning it if present.
    pub async fn remove(&self, path: &Path) -> Option<Vec<u8>> {
        self.blobs.write().await.remove(path)
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(path).cloned())
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

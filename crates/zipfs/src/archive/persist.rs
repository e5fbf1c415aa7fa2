//! Writing archives back to disk.
//!
//! Every persist of `<path>` goes through three steps:
//!
//! 1. delete `<path>.backup` (failure only logged)
//! 2. copy the current `<path>` to `<path>.backup` (failure aborts)
//! 3. encode the archive and overwrite `<path>`
//!
//! An archive recovered from its backup skips steps 1 and 2 on its first
//! persist: the primary is corrupt or missing and the backup is the only
//! good copy. Persists of one archive are serialized.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::SharedArchive;
use crate::codec::ArchiveCodec;
use crate::path;
use crate::vfs::{VfsError, VfsOps, VfsResult};

/// Writes archives through the host filesystem.
pub struct Persister {
    host: Arc<dyn VfsOps>,
    codec: Arc<dyn ArchiveCodec>,
    backup_suffix: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("backup_suffix", &self.backup_suffix)
            .finish_non_exhaustive()
    }
}

impl Persister {
    pub fn new(
        host: Arc<dyn VfsOps>,
        codec: Arc<dyn ArchiveCodec>,
        backup_suffix: impl Into<String>,
    ) -> Self {
        Self {
            host,
            codec,
            backup_suffix: backup_suffix.into(),
            locks: DashMap::new(),
        }
    }

    /// Real path of the backup copy of `archive`.
    pub fn backup_path(&self, archive: &str) -> String {
        format!("{archive}{}", self.backup_suffix)
    }

    /// Persist `shared` to the archive file at `archive`.
    ///
    /// Encodes the archive state as of lock acquisition, so a persist queued
    /// behind another always writes the newer state.
    pub async fn persist(&self, archive: &str, shared: &SharedArchive) -> VfsResult<()> {
        let lock = Arc::clone(self.locks.entry(archive.to_string()).or_default().value());
        let _guard = lock.lock().await;

        let (bytes, recovered) = {
            let state = shared.read();
            let bytes = self.codec.encode(state.entries()).map_err(|e| {
                VfsError::other(format!("cannot encode archive {archive}: {e}"))
            })?;
            (bytes, state.is_recovered())
        };

        let url = path::to_file_url(archive);
        if recovered {
            tracing::info!(archive = %archive, "archive was recovered from backup, keeping backup as is");
        } else {
            self.snapshot(archive, &url).await?;
        }

        self.host.write_file(&url, &bytes).await?;
        shared.write().mark_persisted();
        tracing::info!(archive = %archive, bytes = bytes.len(), "persisted archive");
        Ok(())
    }

    /// Steps 1 and 2: replace the backup with the current on-disk file.
    async fn snapshot(&self, archive: &str, url: &str) -> VfsResult<()> {
        let backup = path::to_file_url(&self.backup_path(archive));

        if let Err(e) = self.host.delete(&backup).await {
            if !e.is_not_found() {
                tracing::warn!(backup = %backup, error = %e, "failed to delete stale backup");
            }
        }

        self.host
            .copy_to(url, &backup)
            .await
            .map_err(|e| VfsError::backup_failure(archive, e))?;
        Ok(())
    }
}

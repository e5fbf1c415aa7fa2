//! Virtual path resolution.
//!
//! A virtual path either names something on the real filesystem
//! (passthrough) or a location inside an archive file somewhere along it.
//! The resolver finds out which by walking upward from the full path:
//!
//! 1. Read the candidate. If it decodes, the candidate is the archive and the
//!    rest of the path is the internal location.
//! 2. If it reads but does not decode, try `<candidate>.backup`. Without a
//!    usable backup the full path is a plain file (passthrough) when the
//!    candidate is the full path, and a corrupt archive otherwise.
//! 3. If it cannot be read, try `<candidate>.backup`, then move to the parent.
//!
//! A real directory at the full path resolves to passthrough. The walk
//! stops with `NotFound` once no parent remains.

use dashmap::DashMap;
use std::sync::Arc;

use super::{Archive, ArchiveCache, SharedArchive};
use crate::codec::ArchiveCodec;
use crate::path;
use crate::vfs::{VfsError, VfsOps, VfsResult};

/// Where a virtual path lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLocation {
    /// Real filesystem path, no archive involved.
    Passthrough(String),
    /// Location inside an archive. `internal` is `""` for the archive root.
    InArchive { archive: String, internal: String },
}

impl ResolvedLocation {
    /// Normalized virtual path of this location.
    pub fn key(&self) -> String {
        match self {
            ResolvedLocation::Passthrough(real) => real.clone(),
            ResolvedLocation::InArchive { archive, internal } if internal.is_empty() => {
                archive.clone()
            }
            ResolvedLocation::InArchive { archive, internal } => format!("{archive}/{internal}"),
        }
    }
}

/// What a single read of a candidate path revealed.
enum Probe {
    Archive(Archive),
    /// Readable, but neither it nor its backup decodes.
    PlainFile(String),
    Missing,
}

/// Resolves virtual paths and loads the archives they land in.
pub struct PathResolver {
    host: Arc<dyn VfsOps>,
    codec: Arc<dyn ArchiveCodec>,
    cache: ArchiveCache,
    /// url → location. Locations stay valid while content changes.
    memo: DashMap<String, ResolvedLocation>,
    backup_suffix: String,
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver")
            .field("cache", &self.cache)
            .field("memoized", &self.memo.len())
            .field("backup_suffix", &self.backup_suffix)
            .finish()
    }
}

impl PathResolver {
    pub fn new(
        host: Arc<dyn VfsOps>,
        codec: Arc<dyn ArchiveCodec>,
        cache: ArchiveCache,
        backup_suffix: impl Into<String>,
    ) -> Self {
        Self {
            host,
            codec,
            cache,
            memo: DashMap::new(),
            backup_suffix: backup_suffix.into(),
        }
    }

    pub fn cache(&self) -> &ArchiveCache {
        &self.cache
    }

    /// Resolve `url` to a real path or an archive location.
    ///
    /// Successful resolutions are memoized; archives discovered on the way
    /// are decoded into the cache.
    pub async fn resolve(&self, url: &str) -> VfsResult<ResolvedLocation> {
        if let Some(hit) = self.memo.get(url) {
            return Ok(hit.clone());
        }

        let normalized = path::normalize(url);
        let location = match self.cache.find_containing(&normalized) {
            Some(archive) => {
                let internal = path::strip_dir_prefix(&normalized, &archive)
                    .unwrap_or_default()
                    .to_string();
                ResolvedLocation::InArchive { archive, internal }
            }
            None => self.search(url, &normalized).await?,
        };

        tracing::debug!(url = %url, location = ?location, "resolved path");
        self.memo.insert(url.to_string(), location.clone());
        Ok(location)
    }

    /// The backtracking search for paths not covered by a resident archive.
    async fn search(&self, url: &str, normalized: &str) -> VfsResult<ResolvedLocation> {
        let mut candidate = normalized.to_string();
        loop {
            match self.probe(&candidate).await {
                Probe::Archive(archive) => {
                    let internal = path::strip_dir_prefix(normalized, &candidate)
                        .unwrap_or_default()
                        .to_string();
                    drop(self.cache.insert(candidate.clone(), archive));
                    return Ok(ResolvedLocation::InArchive {
                        archive: candidate,
                        internal,
                    });
                }
                Probe::PlainFile(_) if candidate == normalized => {
                    return Ok(ResolvedLocation::Passthrough(candidate));
                }
                Probe::PlainFile(reason) => {
                    return Err(VfsError::decode_failure(candidate, reason));
                }
                Probe::Missing => {
                    if candidate == normalized && self.is_real_dir(&candidate).await {
                        return Ok(ResolvedLocation::Passthrough(candidate));
                    }
                    match path::dirname(&candidate) {
                        Some(parent) => candidate = parent,
                        None => return Err(VfsError::not_found(url)),
                    }
                }
            }
        }
    }

    /// Fetch the archive stored at `archive`, reloading it from disk if it
    /// was evicted.
    pub async fn load(&self, archive: &str) -> VfsResult<SharedArchive> {
        if let Some(shared) = self.cache.get(archive) {
            return Ok(shared);
        }

        tracing::info!(archive = %archive, "reloading archive");
        match self.probe(archive).await {
            Probe::Archive(decoded) => Ok(self.cache.insert(archive, decoded)),
            Probe::PlainFile(reason) => Err(VfsError::decode_failure(archive, reason)),
            Probe::Missing => Err(VfsError::not_found(archive)),
        }
    }

    /// Forget memoized resolutions at or under the normalized path `key`.
    pub fn invalidate(&self, key: &str) {
        self.memo
            .retain(|url, _| path::strip_dir_prefix(&path::normalize(url), key).is_none());
    }

    /// Forget every memoized resolution.
    pub fn clear(&self) {
        self.memo.clear();
    }

    async fn probe(&self, candidate: &str) -> Probe {
        match self.host.read_file(&path::to_file_url(candidate)).await {
            Ok(bytes) => match self.codec.decode(&bytes) {
                Ok(entries) => {
                    tracing::info!(archive = %candidate, entries = entries.len(), "loaded archive");
                    Probe::Archive(Archive::new(entries))
                }
                Err(e) => match self.probe_backup(candidate).await {
                    Some(archive) => Probe::Archive(archive),
                    None => Probe::PlainFile(e.to_string()),
                },
            },
            Err(_) => match self.probe_backup(candidate).await {
                Some(archive) => Probe::Archive(archive),
                None => Probe::Missing,
            },
        }
    }

    /// Decode `<candidate><suffix>`, if it exists and is a valid archive.
    async fn probe_backup(&self, candidate: &str) -> Option<Archive> {
        if candidate.is_empty() || candidate.ends_with(&self.backup_suffix) {
            return None;
        }
        let backup = format!("{candidate}{}", self.backup_suffix);
        let bytes = self.host.read_file(&path::to_file_url(&backup)).await.ok()?;
        match self.codec.decode(&bytes) {
            Ok(entries) => {
                tracing::warn!(archive = %candidate, backup = %backup, "recovered archive from backup");
                Some(Archive::recovered(entries))
            }
            Err(e) => {
                tracing::debug!(backup = %backup, error = %e, "backup does not decode");
                None
            }
        }
    }

    async fn is_real_dir(&self, real: &str) -> bool {
        self.host
            .stat(&path::to_file_url(real))
            .await
            .is_ok_and(|stat| stat.is_directory)
    }
}

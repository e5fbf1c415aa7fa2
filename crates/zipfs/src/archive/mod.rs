//! Archive-backed storage.
//!
//! - [`Archive`] - one decoded archive: a flat entry map
//! - [`ArchiveCache`] - decoded archives keyed by real path, evicted when idle
//! - [`PathResolver`] - maps a virtual path to a real path or an archive location
//! - [`EmptyDirs`] / [`synthesize`] - directory views derived from entry names
//! - [`Persister`] - the backup-then-overwrite write protocol
//!
//! Archives have no directory records worth trusting, so directories are
//! never materialized: every listing is a prefix scan over entry names.

mod cache;
mod listing;
mod persist;
mod resolver;

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::codec::Entries;

pub use cache::ArchiveCache;
pub use listing::{EmptyDirs, Listing, synthesize};
pub use persist::Persister;
pub use resolver::{PathResolver, ResolvedLocation};

/// An archive shared between the cache and in-flight operations.
///
/// Holding a clone pins the archive: the cache will not evict it.
pub type SharedArchive = Arc<RwLock<Archive>>;

/// One decoded archive.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Entries,
    /// Loaded from the backup copy rather than the primary file.
    recovered: bool,
}

impl Archive {
    /// Wrap decoded entries.
    pub fn new(entries: Entries) -> Self {
        Self {
            entries,
            recovered: false,
        }
    }

    /// Wrap entries decoded from the backup copy.
    pub fn recovered(entries: Entries) -> Self {
        Self {
            entries,
            recovered: true,
        }
    }

    /// The raw entry map.
    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    /// Number of entries, including explicit directory records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this archive was loaded from its backup and not yet persisted.
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    /// Clear the recovered flag once the primary file has been rewritten.
    pub fn mark_persisted(&mut self) {
        self.recovered = false;
    }

    /// Payload of the entry named exactly `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Returns true if an entry is named exactly `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert or replace an entry. Returns the previous payload.
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(name.into(), data)
    }

    /// Remove the entry named exactly `name`.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    /// Immediate child names of the directory `dir` (`""` is the root).
    ///
    /// Each child appears once however many descendants share it. Entries
    /// sitting exactly on the directory boundary (`dir/`) contribute nothing.
    pub fn children(&self, dir: &str) -> BTreeSet<String> {
        let prefix = dir_prefix(dir);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .filter_map(|(name, _)| {
                let child = name[prefix.len()..].split('/').next().unwrap_or("");
                (!child.is_empty()).then(|| child.to_string())
            })
            .collect()
    }

    /// Returns true if anything lives under `dir`, including an explicit
    /// `dir/` record.
    pub fn has_dir(&self, dir: &str) -> bool {
        let prefix = dir_prefix(dir);
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(name, _)| name.starts_with(&prefix))
    }

    /// Entries under `dir`, as (path relative to `dir`, payload) pairs.
    pub fn entries_under(&self, dir: &str) -> Vec<(String, Vec<u8>)> {
        let prefix = dir_prefix(dir);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .filter(|(name, _)| name.len() > prefix.len())
            .map(|(name, data)| (name[prefix.len()..].to_string(), data.clone()))
            .collect()
    }

    /// Remove every entry under `dir`, including its `dir/` record.
    /// Returns how many entries were removed.
    pub fn remove_dir(&mut self, dir: &str) -> usize {
        let prefix = dir_prefix(dir);
        let before = self.entries.len();
        self.entries.retain(|name, _| !name.starts_with(&prefix));
        before - self.entries.len()
    }
}

/// `dir` with a trailing separator; the root maps to the empty prefix.
fn dir_prefix(dir: &str) -> String {
    if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    }
}

//! Decoded-archive cache with inactivity eviction.
//!
//! Each resident archive carries a last-access instant. Any access refreshes
//! it; an archive idle for longer than the TTL is dropped on the next sweep.
//! Sweeps run lazily on every cache operation, and optionally from a
//! background task (see [`ArchiveCache::spawn_sweeper`]).
//!
//! An archive still referenced outside the cache (an operation holding its
//! [`SharedArchive`]) is never evicted, expired or not.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{Archive, SharedArchive};
use crate::path;

struct Slot {
    archive: SharedArchive,
    last_access: Instant,
}

impl Slot {
    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_access) >= ttl
    }

    fn is_pinned(&self) -> bool {
        Arc::strong_count(&self.archive) > 1
    }
}

struct CacheInner {
    slots: Mutex<HashMap<String, Slot>>,
    ttl: Duration,
}

impl CacheInner {
    fn evict_expired(&self) -> Vec<String> {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        let mut evicted = Vec::new();
        slots.retain(|key, slot| {
            let expire = slot.is_idle(now, self.ttl) && !slot.is_pinned();
            if expire {
                evicted.push(key.clone());
            }
            !expire
        });
        drop(slots);

        for key in &evicted {
            tracing::warn!(archive = %key, ttl_secs = self.ttl.as_secs(), "evicted idle archive");
        }
        evicted
    }
}

/// Decoded archives keyed by the real path of the archive file.
///
/// Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct ArchiveCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for ArchiveCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveCache")
            .field("ttl", &self.inner.ttl)
            .field("resident", &self.keys())
            .finish()
    }
}

impl ArchiveCache {
    /// Create an empty cache evicting archives idle for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                slots: Mutex::new(HashMap::new()),
                ttl,
            }),
        }
    }

    /// Inactivity window after which an unpinned archive is evicted.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Fetch a resident archive and refresh its timer.
    pub fn get(&self, key: &str) -> Option<SharedArchive> {
        self.inner.evict_expired();
        let mut slots = self.inner.slots.lock();
        let slot = slots.get_mut(key)?;
        slot.last_access = Instant::now();
        tracing::debug!(archive = %key, "archive cache hit");
        Some(Arc::clone(&slot.archive))
    }

    /// Insert (or replace) an archive with a fresh timer.
    pub fn insert(&self, key: impl Into<String>, archive: Archive) -> SharedArchive {
        self.inner.evict_expired();
        let shared = Arc::new(RwLock::new(archive));
        self.inner.slots.lock().insert(
            key.into(),
            Slot {
                archive: Arc::clone(&shared),
                last_access: Instant::now(),
            },
        );
        shared
    }

    /// Drop an archive regardless of its timer.
    pub fn remove(&self, key: &str) -> Option<SharedArchive> {
        self.inner.slots.lock().remove(key).map(|slot| slot.archive)
    }

    /// Returns true if `key` is resident. Does not refresh the timer.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.slots.lock().contains_key(key)
    }

    /// Resident archive keys, unordered.
    pub fn keys(&self) -> Vec<String> {
        self.inner.slots.lock().keys().cloned().collect()
    }

    /// Number of resident archives.
    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    /// Returns true if no archive is resident.
    pub fn is_empty(&self) -> bool {
        self.inner.slots.lock().is_empty()
    }

    /// Longest resident key that is `path` itself or a directory prefix of it.
    ///
    /// Does not refresh any timer.
    pub fn find_containing(&self, path: &str) -> Option<String> {
        self.inner
            .slots
            .lock()
            .keys()
            .filter(|key| path::strip_dir_prefix(path, key).is_some())
            .max_by_key(|key| key.len())
            .cloned()
    }

    /// Evict every idle, unpinned archive. Returns the evicted keys.
    pub fn evict_expired(&self) -> Vec<String> {
        self.inner.evict_expired()
    }

    /// Sweep on a fixed interval from a background task.
    ///
    /// The task holds only a weak reference and exits once every clone of
    /// the cache is dropped. Must be called within a Tokio runtime.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    tracing::debug!("archive cache dropped, sweeper exiting");
                    break;
                };
                inner.evict_expired();
            }
        })
    }
}

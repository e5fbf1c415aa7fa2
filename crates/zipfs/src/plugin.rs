//! Host integration.
//!
//! [`ZipFsPlugin`] registers the overlay with an [`ExtensionRegistry`] at
//! init and removes it at teardown. Both are safe to call more than once.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::engine::ZipFs;
use crate::vfs::{ExtensionRegistry, FsFactory, ScopedFs, VfsOps};

/// Lifecycle of one [`ZipFs`] inside a host.
pub struct ZipFsPlugin {
    fs: Arc<ZipFs>,
    registry: Arc<ExtensionRegistry>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ZipFsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFsPlugin")
            .field("scheme", &self.fs.config().scheme)
            .field("active", &self.is_active())
            .finish()
    }
}

impl ZipFsPlugin {
    pub fn new(fs: Arc<ZipFs>, registry: Arc<ExtensionRegistry>) -> Self {
        Self {
            fs,
            registry,
            sweeper: Mutex::new(None),
        }
    }

    pub fn fs(&self) -> &Arc<ZipFs> {
        &self.fs
    }

    /// Returns true while the overlay is registered.
    pub fn is_active(&self) -> bool {
        self.registry.is_registered(&self.fs.config().scheme)
    }

    /// Register the overlay and start the cache sweeper.
    ///
    /// Returns false if the overlay was already registered, in which case
    /// nothing changes. The sweeper only starts inside a Tokio runtime;
    /// without one, idle archives are still evicted lazily.
    pub fn init(&self) -> bool {
        let scheme = self.fs.config().scheme.clone();
        if self.registry.is_registered(&scheme) {
            tracing::debug!(scheme = %scheme, "zipfs already registered");
            return false;
        }

        let fs: Arc<dyn VfsOps> = self.fs.clone();
        let factory: FsFactory = Arc::new(move |url: &str| ScopedFs::new(Arc::clone(&fs), url));
        self.registry.register(scheme.clone(), factory);

        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() && tokio::runtime::Handle::try_current().is_ok() {
            *sweeper = self.fs.spawn_sweeper();
        }
        tracing::info!(scheme = %scheme, sweeper = sweeper.is_some(), "zipfs registered");
        true
    }

    /// Unregister the overlay and stop the sweeper.
    ///
    /// Returns false if the overlay was not registered.
    pub fn destroy(&self) -> bool {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        let scheme = &self.fs.config().scheme;
        let removed = self.registry.unregister(scheme);
        if removed {
            tracing::info!(scheme = %scheme, "zipfs unregistered");
        }
        removed
    }
}

impl Drop for ZipFsPlugin {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

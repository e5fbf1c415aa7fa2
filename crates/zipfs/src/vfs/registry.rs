//! Filesystem extension registry with longest-prefix routing.
//!
//! The host keeps one registry. Plugins register a url prefix (the "test")
//! together with a factory producing a [`ScopedFs`] for any matching url.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::error::{VfsError, VfsResult};
use super::ops::{ScopedFs, VfsOps};

/// Builds a url-scoped filesystem for a matching url.
pub type FsFactory = Arc<dyn Fn(&str) -> ScopedFs + Send + Sync>;

/// Routes urls to filesystem extensions.
///
/// Prefixes are matched longest first. For example, if `zip:` and
/// `zip://vendor/` are both registered, `zip://vendor/a.zip/x` is routed to
/// the `zip://vendor/` extension. Urls matching no prefix go to the fallback
/// filesystem, if one is set.
pub struct ExtensionRegistry {
    /// Factories, keyed by url prefix.
    extensions: RwLock<BTreeMap<String, FsFactory>>,
    fallback: Option<Arc<dyn VfsOps>>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.tests())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    /// Create a new empty registry with no fallback.
    pub fn new() -> Self {
        Self {
            extensions: RwLock::new(BTreeMap::new()),
            fallback: None,
        }
    }

    /// Create a registry that routes unmatched urls to `fallback`.
    pub fn with_fallback(fallback: Arc<dyn VfsOps>) -> Self {
        Self {
            extensions: RwLock::new(BTreeMap::new()),
            fallback: Some(fallback),
        }
    }

    /// Register a factory for urls starting with `test`.
    ///
    /// Re-registering the same prefix replaces the previous factory.
    /// Returns `true` if the prefix was not registered before.
    pub fn register(&self, test: impl Into<String>, factory: FsFactory) -> bool {
        let test = test.into();
        let mut extensions = self.extensions.write();
        let fresh = extensions.insert(test.clone(), factory).is_none();
        if !fresh {
            tracing::debug!(test = %test, "replaced filesystem extension");
        }
        fresh
    }

    /// Remove the extension registered for `test`.
    ///
    /// Returns `true` if an extension was removed, `false` if nothing was
    /// registered there.
    pub fn unregister(&self, test: &str) -> bool {
        self.extensions.write().remove(test).is_some()
    }

    /// Returns true if `test` is registered.
    pub fn is_registered(&self, test: &str) -> bool {
        self.extensions.read().contains_key(test)
    }

    /// All registered prefixes, sorted.
    pub fn tests(&self) -> Vec<String> {
        self.extensions.read().keys().cloned().collect()
    }

    /// Find the filesystem for `url`.
    pub fn open(&self, url: &str) -> VfsResult<ScopedFs> {
        let factory = {
            let extensions = self.extensions.read();
            extensions
                .iter()
                .filter(|(test, _)| url.starts_with(test.as_str()))
                .max_by_key(|(test, _)| test.len())
                .map(|(_, factory)| Arc::clone(factory))
        };

        match (factory, &self.fallback) {
            (Some(factory), _) => Ok(factory(url)),
            (None, Some(fallback)) => Ok(ScopedFs::new(Arc::clone(fallback), url)),
            (None, None) => Err(VfsError::unsupported(format!("no filesystem for {url}"))),
        }
    }
}

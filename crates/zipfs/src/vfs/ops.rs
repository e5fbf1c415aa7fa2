//! VFS operations trait.
//!
//! This is the operation set the host editor drives every filesystem
//! through: url-based, whole-file reads and writes, no handles.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

use super::types::{Encoding, FileContent, Stat};
use super::{VfsError, VfsResult};
use crate::path;

/// Core VFS operations trait.
///
/// Every method takes the url it acts on. Implementations accept their own
/// scheme (`file://` for real backends, `zip://` for the archive overlay).
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get metadata for `url`.
    async fn stat(&self, url: &str) -> VfsResult<Stat>;

    /// List a directory, one [`Stat`] per child.
    async fn ls_dir(&self, url: &str) -> VfsResult<Vec<Stat>>;

    /// Read entire file contents.
    async fn read_file(&self, url: &str) -> VfsResult<Vec<u8>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Replace the contents of an existing file.
    async fn write_file(&self, url: &str, content: &[u8]) -> VfsResult<()>;

    /// Create a file named `name` inside the directory `url`.
    ///
    /// Returns the url of the new file.
    async fn create_file(&self, url: &str, name: &str, content: &[u8]) -> VfsResult<String>;

    /// Create a directory named `name` inside the directory `url`.
    ///
    /// Returns the url of the new directory.
    async fn create_directory(&self, url: &str, name: &str) -> VfsResult<String>;

    /// Delete a file, or a directory and everything under it.
    async fn delete(&self, url: &str) -> VfsResult<()>;

    /// Copy `url` to `destination`.
    ///
    /// If `destination` is an existing directory the copy lands inside it
    /// under the source's base name; otherwise it is written at
    /// `destination` itself. Returns the url of the copy.
    async fn copy_to(&self, url: &str, destination: &str) -> VfsResult<String>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Move `url` to `destination`: copy, then delete the source.
    async fn move_to(&self, url: &str, destination: &str) -> VfsResult<String> {
        let moved = self.copy_to(url, destination).await?;
        self.delete(url).await?;
        Ok(moved)
    }

    /// Rename `url` within its parent directory.
    async fn rename_to(&self, url: &str, new_name: &str) -> VfsResult<String> {
        let new_name = path::validate_name(new_name)?;
        let parent = path::dirname(url).ok_or_else(|| VfsError::not_found(url))?;
        let destination = path::join(&parent, new_name);
        self.move_to(url, &destination).await
    }

    /// Check if `url` exists. Never fails.
    async fn exists(&self, url: &str) -> bool {
        self.stat(url).await.is_ok()
    }

    /// Read a file, decoding it according to `encoding`.
    async fn read_with(&self, url: &str, encoding: Option<Encoding>) -> VfsResult<FileContent> {
        let bytes = self.read_file(url).await?;
        FileContent::decode(bytes, encoding)
    }

    /// Read a file as UTF-8 text.
    async fn read_to_string(&self, url: &str) -> VfsResult<String> {
        let bytes = self.read_file(url).await?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Read a file as a JSON value.
    async fn read_json(&self, url: &str) -> VfsResult<serde_json::Value> {
        let bytes = self.read_file(url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// A filesystem bound to one url.
///
/// This is what the extension registry hands to the host: the same
/// operation set as [`VfsOps`], scoped to a single path.
#[derive(Clone)]
pub struct ScopedFs {
    fs: Arc<dyn VfsOps>,
    url: String,
}

impl fmt::Debug for ScopedFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedFs").field("url", &self.url).finish()
    }
}

impl ScopedFs {
    /// Bind `fs` to `url`.
    pub fn new(fs: Arc<dyn VfsOps>, url: impl Into<String>) -> Self {
        Self {
            fs,
            url: url.into(),
        }
    }

    /// The url this handle is bound to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// See [`VfsOps::ls_dir`].
    pub async fn ls_dir(&self) -> VfsResult<Vec<Stat>> {
        self.fs.ls_dir(&self.url).await
    }

    /// See [`VfsOps::read_with`].
    pub async fn read_file(&self, encoding: Option<Encoding>) -> VfsResult<FileContent> {
        self.fs.read_with(&self.url, encoding).await
    }

    /// Read and deserialize JSON into `T`.
    pub async fn read_json<T: DeserializeOwned>(&self) -> VfsResult<T> {
        let bytes = self.fs.read_file(&self.url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// See [`VfsOps::write_file`].
    pub async fn write_file(&self, content: impl Into<FileContent>) -> VfsResult<()> {
        let bytes = content.into().into_bytes()?;
        self.fs.write_file(&self.url, &bytes).await
    }

    /// See [`VfsOps::create_file`]. Missing content creates an empty file.
    pub async fn create_file(
        &self,
        name: &str,
        content: Option<FileContent>,
    ) -> VfsResult<String> {
        let bytes = match content {
            Some(content) => content.into_bytes()?,
            None => Vec::new(),
        };
        self.fs.create_file(&self.url, name, &bytes).await
    }

    /// See [`VfsOps::create_directory`].
    pub async fn create_directory(&self, name: &str) -> VfsResult<String> {
        self.fs.create_directory(&self.url, name).await
    }

    /// See [`VfsOps::delete`].
    pub async fn delete(&self) -> VfsResult<()> {
        self.fs.delete(&self.url).await
    }

    /// See [`VfsOps::copy_to`].
    pub async fn copy_to(&self, destination: &str) -> VfsResult<String> {
        self.fs.copy_to(&self.url, destination).await
    }

    /// See [`VfsOps::move_to`].
    pub async fn move_to(&self, destination: &str) -> VfsResult<String> {
        self.fs.move_to(&self.url, destination).await
    }

    /// See [`VfsOps::rename_to`].
    pub async fn rename_to(&self, new_name: &str) -> VfsResult<String> {
        self.fs.rename_to(&self.url, new_name).await
    }

    /// See [`VfsOps::exists`].
    pub async fn exists(&self) -> bool {
        self.fs.exists(&self.url).await
    }

    /// See [`VfsOps::stat`].
    pub async fn stat(&self) -> VfsResult<Stat> {
        self.fs.stat(&self.url).await
    }
}

//! Local filesystem backend.
//!
//! The passthrough bridge onto real files. Urls (`file:///a/b` or plain
//! `/a/b`) are mapped under `root`, with path security to prevent escaping
//! the root directory.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::path;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::Stat;

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then `read_file("file:///src/main.rs")` reads
/// `/home/amy/project/src/main.rs`. A backend rooted at `/` sees the whole
/// disk.
///
/// Path security is enforced: attempts to escape via `..` are blocked.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self { root }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a url to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root (via `..`).
    fn resolve(&self, url: &str) -> VfsResult<PathBuf> {
        let relative = Path::new(path::real_path(url).trim_start_matches('/'));

        let mut full = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => full.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(VfsError::path_escapes_root(url));
                }
            }
        }
        Ok(full)
    }

    /// Convert std::fs::Metadata to a Stat record.
    fn metadata_to_stat(&self, url: &str, meta: &std::fs::Metadata) -> Stat {
        Stat {
            name: path::basename(url).to_string(),
            url: url.to_string(),
            is_file: meta.is_file(),
            is_directory: meta.is_dir(),
            is_link: meta.file_type().is_symlink(),
            size: meta.len(),
            modified_date: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            can_read: true,
            can_write: !meta.permissions().readonly(),
        }
    }

    /// Where a copy or move of `url` to `destination` lands.
    async fn placement(&self, url: &str, destination: &str) -> VfsResult<(PathBuf, String)> {
        let dest_path = self.resolve(destination)?;
        if fs::metadata(&dest_path).await.is_ok_and(|m| m.is_dir()) {
            let name = path::basename(url);
            Ok((dest_path.join(name), path::join(destination, name)))
        } else {
            Ok((dest_path, destination.to_string()))
        }
    }

    /// Copy a directory tree.
    async fn copy_tree(from: &Path, to: &Path) -> VfsResult<()> {
        let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
        while let Some((src, dst)) = pending.pop() {
            fs::create_dir_all(&dst).await?;
            let mut dir = fs::read_dir(&src).await?;
            while let Some(entry) = dir.next_entry().await? {
                let target = dst.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), target));
                } else {
                    fs::copy(entry.path(), &target).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VfsOps for LocalBackend {
    async fn stat(&self, url: &str) -> VfsResult<Stat> {
        let full_path = self.resolve(url)?;
        let meta = fs::symlink_metadata(&full_path).await?;
        Ok(self.metadata_to_stat(url, &meta))
    }

    async fn ls_dir(&self, url: &str) -> VfsResult<Vec<Stat>> {
        let full_path = self.resolve(url)?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let child = path::join(url, &entry.file_name().to_string_lossy());
            entries.push(self.metadata_to_stat(&child, &meta));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_file(&self, url: &str) -> VfsResult<Vec<u8>> {
        let full_path = self.resolve(url)?;
        Ok(fs::read(&full_path).await?)
    }

    async fn write_file(&self, url: &str, content: &[u8]) -> VfsResult<()> {
        let full_path = self.resolve(url)?;
        if fs::metadata(&full_path).await.is_ok_and(|m| m.is_dir()) {
            return Err(VfsError::is_a_directory(url));
        }
        Ok(fs::write(&full_path, content).await?)
    }

    async fn create_file(&self, url: &str, name: &str, content: &[u8]) -> VfsResult<String> {
        use tokio::io::AsyncWriteExt;

        let name = path::validate_name(name)?;
        let child = path::join(url, name);
        let full_path = self.resolve(&child)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => VfsError::already_exists(&child),
                _ => VfsError::from(e),
            })?;
        file.write_all(content).await?;
        file.flush().await?;

        Ok(child)
    }

    async fn create_directory(&self, url: &str, name: &str) -> VfsResult<String> {
        let name = path::validate_name(name)?;
        let child = path::join(url, name);
        let full_path = self.resolve(&child)?;

        fs::create_dir(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => VfsError::already_exists(&child),
            _ => VfsError::from(e),
        })?;
        Ok(child)
    }

    async fn delete(&self, url: &str) -> VfsResult<()> {
        let full_path = self.resolve(url)?;
        if full_path == self.root {
            return Err(VfsError::invalid_path("cannot delete root"));
        }

        let meta = fs::symlink_metadata(&full_path).await?;
        if meta.is_dir() {
            fs::remove_dir_all(&full_path).await?;
        } else {
            fs::remove_file(&full_path).await?;
        }
        Ok(())
    }

    async fn copy_to(&self, url: &str, destination: &str) -> VfsResult<String> {
        let from = self.resolve(url)?;
        let (to, copied) = self.placement(url, destination).await?;

        if fs::metadata(&from).await?.is_dir() {
            if to.starts_with(&from) {
                return Err(VfsError::invalid_path(format!(
                    "cannot copy {url} into itself"
                )));
            }
            Self::copy_tree(&from, &to).await?;
        } else {
            fs::copy(&from, &to).await?;
        }
        Ok(copied)
    }

    async fn move_to(&self, url: &str, destination: &str) -> VfsResult<String> {
        let from = self.resolve(url)?;
        let (to, moved) = self.placement(url, destination).await?;
        fs::rename(&from, &to).await?;
        Ok(moved)
    }
}

//! In-memory filesystem backend.
//!
//! Stands in for the host filesystem in tests and embedders that keep
//! archives in memory. All data is ephemeral.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use crate::path;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::Stat;

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, mtime: SystemTime },
    Directory { mtime: SystemTime },
}

impl Entry {
    fn file(data: Vec<u8>) -> Self {
        Entry::File {
            data,
            mtime: SystemTime::now(),
        }
    }

    fn directory() -> Self {
        Entry::Directory {
            mtime: SystemTime::now(),
        }
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via internal `RwLock`. Keys are normalized paths without a
/// leading `/`, so `file:///a/b`, `/a/b` and `a/b` name the same entry.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
    fail_copies: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, creating parent directories.
    pub fn insert_file(&self, url: &str, data: impl Into<Vec<u8>>) {
        let key = Self::normalize(url);
        let mut entries = self.entries.write();
        Self::ensure_parents(&mut entries, &key);
        entries.insert(key, Entry::file(data.into()));
    }

    /// Make every subsequent `copy_to` fail with an I/O error.
    pub fn set_fail_copies(&self, fail: bool) {
        self.fail_copies.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `write_file` fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of a file's bytes, if it exists.
    pub fn file_bytes(&self, url: &str) -> Option<Vec<u8>> {
        match self.entries.read().get(&Self::normalize(url)) {
            Some(Entry::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Normalize a url: strip the scheme, resolve `.` and `..`, drop empty
    /// segments and the leading `/`.
    fn normalize(url: &str) -> String {
        let mut segments: Vec<&str> = Vec::new();
        for segment in path::real_path(url).split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        segments.join("/")
    }

    /// Parent key of a normalized key (`""` is the root).
    fn parent_key(key: &str) -> Option<&str> {
        if key.is_empty() {
            return None;
        }
        Some(key.rfind('/').map_or("", |idx| &key[..idx]))
    }

    /// Ensure all parent directories exist.
    fn ensure_parents(entries: &mut HashMap<String, Entry>, key: &str) {
        let mut current = String::new();
        let segments: Vec<&str> = key.split('/').collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            entries
                .entry(current.clone())
                .or_insert_with(Entry::directory);
        }
    }

    fn is_dir(entries: &HashMap<String, Entry>, key: &str) -> bool {
        key.is_empty() || matches!(entries.get(key), Some(Entry::Directory { .. }))
    }

    fn stat_entry(url: &str, entry: Option<&Entry>, is_root: bool) -> VfsResult<Stat> {
        let (is_file, size, mtime) = match entry {
            Some(Entry::File { data, mtime }) => (true, data.len() as u64, *mtime),
            Some(Entry::Directory { mtime }) => (false, 0, *mtime),
            None if is_root => (false, 0, SystemTime::now()),
            None => return Err(VfsError::not_found(url)),
        };
        Ok(Stat {
            name: path::basename(url).to_string(),
            url: url.to_string(),
            is_file,
            is_directory: !is_file,
            is_link: false,
            size,
            modified_date: mtime,
            can_read: true,
            can_write: true,
        })
    }

    fn failure(op: &str, url: &str) -> VfsError {
        VfsError::Io(std::io::Error::other(format!("injected {op} failure: {url}")))
    }
}

#[async_trait]
impl VfsOps for MemoryBackend {
    async fn stat(&self, url: &str) -> VfsResult<Stat> {
        let key = Self::normalize(url);
        let entries = self.entries.read();
        Self::stat_entry(url, entries.get(&key), key.is_empty())
    }

    async fn ls_dir(&self, url: &str) -> VfsResult<Vec<Stat>> {
        let key = Self::normalize(url);
        let entries = self.entries.read();

        match entries.get(&key) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => return Err(VfsError::not_a_directory(url)),
            None if key.is_empty() => {}
            None => return Err(VfsError::not_found(url)),
        }

        let mut result = Vec::new();
        for (entry_key, entry) in entries.iter() {
            if Self::parent_key(entry_key) == Some(key.as_str()) {
                let child = path::join(url, path::basename(entry_key));
                result.push(Self::stat_entry(&child, Some(entry), false)?);
            }
        }

        // Sort for consistent ordering
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn read_file(&self, url: &str) -> VfsResult<Vec<u8>> {
        let key = Self::normalize(url);
        match self.entries.read().get(&key) {
            Some(Entry::File { data, .. }) => Ok(data.clone()),
            Some(Entry::Directory { .. }) => Err(VfsError::is_a_directory(url)),
            None if key.is_empty() => Err(VfsError::is_a_directory(url)),
            None => Err(VfsError::not_found(url)),
        }
    }

    async fn write_file(&self, url: &str, content: &[u8]) -> VfsResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::failure("write", url));
        }
        let key = Self::normalize(url);
        let mut entries = self.entries.write();

        if Self::is_dir(&entries, &key) {
            return Err(VfsError::is_a_directory(url));
        }
        Self::ensure_parents(&mut entries, &key);
        entries.insert(key, Entry::file(content.to_vec()));
        Ok(())
    }

    async fn create_file(&self, url: &str, name: &str, content: &[u8]) -> VfsResult<String> {
        let name = path::validate_name(name)?;
        let dir_key = Self::normalize(url);
        let child = path::join(url, name);
        let key = Self::normalize(&child);
        let mut entries = self.entries.write();

        if !Self::is_dir(&entries, &dir_key) {
            return Err(VfsError::not_a_directory(url));
        }
        if entries.contains_key(&key) {
            return Err(VfsError::already_exists(child));
        }
        entries.insert(key, Entry::file(content.to_vec()));
        Ok(child)
    }

    async fn create_directory(&self, url: &str, name: &str) -> VfsResult<String> {
        let name = path::validate_name(name)?;
        let dir_key = Self::normalize(url);
        let child = path::join(url, name);
        let key = Self::normalize(&child);
        let mut entries = self.entries.write();

        if !Self::is_dir(&entries, &dir_key) {
            return Err(VfsError::not_a_directory(url));
        }
        if entries.contains_key(&key) {
            return Err(VfsError::already_exists(child));
        }
        entries.insert(key, Entry::directory());
        Ok(child)
    }

    async fn delete(&self, url: &str) -> VfsResult<()> {
        let key = Self::normalize(url);
        if key.is_empty() {
            return Err(VfsError::invalid_path("cannot delete root"));
        }

        let mut entries = self.entries.write();
        match entries.remove(&key) {
            Some(Entry::Directory { .. }) => {
                let prefix = format!("{key}/");
                entries.retain(|k, _| !k.starts_with(&prefix));
                Ok(())
            }
            Some(Entry::File { .. }) => Ok(()),
            None => Err(VfsError::not_found(url)),
        }
    }

    async fn copy_to(&self, url: &str, destination: &str) -> VfsResult<String> {
        if self.fail_copies.load(Ordering::SeqCst) {
            return Err(Self::failure("copy", url));
        }
        let from = Self::normalize(url);
        let mut entries = self.entries.write();

        let dest_key = Self::normalize(destination);
        let (to, copied) = if Self::is_dir(&entries, &dest_key) {
            let name = path::basename(url);
            (path::join(&dest_key, name), path::join(destination, name))
        } else {
            (dest_key, destination.to_string())
        };

        match entries.get(&from).cloned() {
            Some(file @ Entry::File { .. }) => {
                Self::ensure_parents(&mut entries, &to);
                entries.insert(to, file);
            }
            Some(dir @ Entry::Directory { .. }) => {
                let prefix = format!("{from}/");
                let children: Vec<(String, Entry)> = entries
                    .iter()
                    .filter_map(|(k, e)| {
                        k.strip_prefix(&prefix)
                            .map(|rest| (format!("{to}/{rest}"), e.clone()))
                    })
                    .collect();
                Self::ensure_parents(&mut entries, &to);
                entries.insert(to, dir);
                entries.extend(children);
            }
            None => return Err(VfsError::not_found(url)),
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_read() {
        let fs = MemoryBackend::new();
        fs.create_file("/", "test.txt", b"hello world").await.unwrap();

        let data = fs.read_file("file:///test.txt").await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_mkdir_and_ls_dir() {
        let fs = MemoryBackend::new();
        fs.create_directory("/", "subdir").await.unwrap();
        fs.create_file("/subdir", "file.txt", b"").await.unwrap();
        fs.create_file("/", "root.txt", b"").await.unwrap();

        let entries = fs.ls_dir("/").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["root.txt", "subdir"]);

        let subentries = fs.ls_dir("/subdir").await.unwrap();
        assert_eq!(subentries.len(), 1);
        assert_eq!(subentries[0].name, "file.txt");
        assert_eq!(subentries[0].url, "/subdir/file.txt");
    }

    #[tokio::test]
    async fn test_delete_directory() {
        let fs = MemoryBackend::new();
        fs.insert_file("/a/b/c.txt", "x");
        fs.delete("/a").await.unwrap();
        assert!(!fs.exists("/a/b/c.txt").await);
        assert!(!fs.exists("/a").await);
    }

    #[tokio::test]
    async fn test_copy_into_directory() {
        let fs = MemoryBackend::new();
        fs.insert_file("/src/a.txt", "a");
        fs.create_directory("/", "dest").await.unwrap();

        let copied = fs.copy_to("/src/a.txt", "/dest").await.unwrap();
        assert_eq!(copied, "/dest/a.txt");
        assert_eq!(fs.file_bytes("/dest/a.txt").unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let fs = MemoryBackend::new();
        fs.insert_file("/a.txt", "a");

        fs.set_fail_copies(true);
        assert!(fs.copy_to("/a.txt", "/b.txt").await.is_err());

        fs.set_fail_writes(true);
        assert!(fs.write_file("/a.txt", b"x").await.is_err());
        assert_eq!(fs.file_bytes("/a.txt").unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_path_normalization() {
        let fs = MemoryBackend::new();
        fs.insert_file("/a/b/c.txt", "c");

        // Various path forms should all work
        assert!(fs.stat("a/b/c.txt").await.is_ok());
        assert!(fs.stat("file:///a/b/c.txt").await.is_ok());
        assert!(fs.stat("a/./b/c.txt").await.is_ok());
        assert!(fs.stat("a/b/../b/c.txt").await.is_ok());
        assert!(fs.stat("/a/b").await.unwrap().is_directory);
    }
}

//! Directory synthesis.
//!
//! A location inside an archive is a file when an entry carries its exact
//! name, and a directory when any entry name continues past it. Directories
//! created explicitly but still empty have no entry to show for it; they
//! live in [`EmptyDirs`] until a file is placed beneath them.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};

use super::Archive;
use crate::path;

/// What a location inside an archive turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Exact entry match: the payload.
    File(Vec<u8>),
    /// Synthesized directory: immediate child names, deduplicated.
    Directory(BTreeSet<String>),
}

/// Registry of empty directories that exist only in memory.
///
/// Keys are normalized virtual paths (`/real/file.zip/dir`), no scheme, no
/// trailing separator.
#[derive(Debug, Default)]
pub struct EmptyDirs {
    dirs: RwLock<HashSet<String>>,
}

impl EmptyDirs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key`. Returns false if it was already registered.
    pub fn insert(&self, key: impl Into<String>) -> bool {
        self.dirs.write().insert(key.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.dirs.read().contains(key)
    }

    /// Unregister `key` and everything under it. Returns how many were removed.
    pub fn remove_under(&self, key: &str) -> usize {
        let mut dirs = self.dirs.write();
        let before = dirs.len();
        dirs.retain(|dir| path::strip_dir_prefix(dir, key).is_none());
        before - dirs.len()
    }

    /// Unregister every proper ancestor of `key`.
    ///
    /// Called when something is created at `key`: its ancestors are no
    /// longer empty.
    pub fn clear_ancestors(&self, key: &str) {
        self.dirs
            .write()
            .retain(|dir| !matches!(path::strip_dir_prefix(key, dir), Some(rest) if !rest.is_empty()));
    }

    /// Registered directories directly under `key`, by name.
    pub fn children_of(&self, key: &str) -> BTreeSet<String> {
        self.dirs
            .read()
            .iter()
            .filter_map(|dir| path::strip_dir_prefix(dir, key))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect()
    }

    /// Registered directories under `key` (excluding `key`), as paths
    /// relative to it.
    pub fn descendants_of(&self, key: &str) -> Vec<String> {
        self.dirs
            .read()
            .iter()
            .filter_map(|dir| path::strip_dir_prefix(dir, key))
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dirs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.read().is_empty()
    }
}

/// Decide what `internal` names inside `archive`.
///
/// `key` is the normalized virtual path of the same location, used to look
/// up registered empty directories. The archive root always lists. Returns
/// `None` when nothing lives there.
pub fn synthesize(archive: &Archive, internal: &str, key: &str, empty_dirs: &EmptyDirs) -> Option<Listing> {
    if !internal.is_empty() {
        if let Some(data) = archive.get(internal) {
            return Some(Listing::File(data.to_vec()));
        }
    }

    let mut children = archive.children(internal);
    children.extend(empty_dirs.children_of(key));

    if internal.is_empty()
        || !children.is_empty()
        || archive.has_dir(internal)
        || empty_dirs.contains(key)
    {
        Some(Listing::Directory(children))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Entries;

    fn archive() -> Archive {
        let mut entries = Entries::new();
        entries.insert("dir/test.txt".into(), b"hi".to_vec());
        entries.insert("dir/hello.txt".into(), b"yo".to_vec());
        entries.insert("dir/sub/deep.txt".into(), b"deep".to_vec());
        entries.insert("kept/".into(), Vec::new());
        Archive::new(entries)
    }

    fn names(listing: Option<Listing>) -> Vec<String> {
        match listing {
            Some(Listing::Directory(children)) => children.into_iter().collect(),
            other => panic!("expected directory, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_entry_is_file() {
        let dirs = EmptyDirs::new();
        assert_eq!(
            synthesize(&archive(), "dir/test.txt", "/f.zip/dir/test.txt", &dirs),
            Some(Listing::File(b"hi".to_vec()))
        );
    }

    #[test]
    fn test_directory_children() {
        let dirs = EmptyDirs::new();
        let listing = synthesize(&archive(), "dir", "/f.zip/dir", &dirs);
        assert_eq!(names(listing), vec!["hello.txt", "sub", "test.txt"]);
    }

    #[test]
    fn test_root_lists_first_segments() {
        let dirs = EmptyDirs::new();
        assert_eq!(names(synthesize(&archive(), "", "/f.zip", &dirs)), vec!["dir", "kept"]);
        assert_eq!(
            synthesize(&Archive::default(), "", "/f.zip", &dirs),
            Some(Listing::Directory(BTreeSet::new()))
        );
    }

    #[test]
    fn test_explicit_directory_record() {
        let dirs = EmptyDirs::new();
        assert!(names(synthesize(&archive(), "kept", "/f.zip/kept", &dirs)).is_empty());
    }

    #[test]
    fn test_missing_location() {
        let dirs = EmptyDirs::new();
        assert_eq!(synthesize(&archive(), "nope", "/f.zip/nope", &dirs), None);
        assert_eq!(synthesize(&archive(), "di", "/f.zip/di", &dirs), None);
    }

    #[test]
    fn test_empty_dirs_show_up() {
        let dirs = EmptyDirs::new();
        dirs.insert("/f.zip/dir/fresh");
        dirs.insert("/f.zip/dir/fresh/inner");

        let listing = synthesize(&archive(), "dir", "/f.zip/dir", &dirs);
        assert_eq!(names(listing), vec!["fresh", "hello.txt", "sub", "test.txt"]);

        let listing = synthesize(&archive(), "dir/fresh", "/f.zip/dir/fresh", &dirs);
        assert_eq!(names(listing), vec!["inner"]);
    }

    #[test]
    fn test_marker_over_content_keeps_entries() {
        let dirs = EmptyDirs::new();
        dirs.insert("/f.zip/dir/sub");
        dirs.insert("/f.zip/dir/sub/extra");

        let listing = synthesize(&archive(), "dir/sub", "/f.zip/dir/sub", &dirs);
        assert_eq!(names(listing), vec!["deep.txt", "extra"]);
    }

    #[test]
    fn test_clear_ancestors() {
        let dirs = EmptyDirs::new();
        dirs.insert("/f.zip/a");
        dirs.insert("/f.zip/a/b");
        dirs.insert("/f.zip/ab");

        dirs.clear_ancestors("/f.zip/a/b/file.txt");
        assert_eq!(dirs.len(), 1);
        assert!(dirs.contains("/f.zip/ab"));
    }

    #[test]
    fn test_remove_under() {
        let dirs = EmptyDirs::new();
        dirs.insert("/f.zip/a");
        dirs.insert("/f.zip/a/b");
        dirs.insert("/f.zip/ab");

        assert_eq!(dirs.remove_under("/f.zip/a"), 2);
        assert_eq!(dirs.descendants_of("/f.zip"), vec!["ab".to_string()]);
    }
}

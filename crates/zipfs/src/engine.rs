//! The archive overlay filesystem.
//!
//! [`ZipFs`] serves `zip://` urls. Each call resolves its url first: real
//! paths are delegated to the host filesystem through `file://` urls, paths
//! inside an archive are served from the decoded entry map. Every call that
//! changes an archive persists it before returning.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::archive::{
    Archive, ArchiveCache, EmptyDirs, Listing, PathResolver, Persister, ResolvedLocation,
    SharedArchive, synthesize,
};
use crate::codec::{ArchiveCodec, ZipCodec};
use crate::config::ZipFsConfig;
use crate::path;
use crate::vfs::{FileType, Stat, VfsError, VfsOps, VfsResult};

/// What [`ZipFs::resolve`] found at a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A real file or directory, by real path.
    Passthrough(String),
    /// An archive entry: its bytes.
    File(Vec<u8>),
    /// A directory inside an archive: its child names.
    Directory(BTreeSet<String>),
}

/// A resolved url, holding the archive it lives in (if any) for the length
/// of an operation.
enum Node {
    Real(String),
    File {
        archive: String,
        shared: SharedArchive,
        entry: String,
        key: String,
        data: Vec<u8>,
    },
    Dir {
        archive: String,
        shared: SharedArchive,
        dir: String,
        key: String,
        children: BTreeSet<String>,
    },
}

/// Where a copy lands.
enum Target {
    /// Existing real directory: the copy goes inside it.
    RealDir(String),
    /// Real path written as is.
    RealPath(String),
    /// Archive entry written as is.
    Entry {
        archive: String,
        shared: SharedArchive,
        internal: String,
        key: String,
    },
}

/// Archive overlay over a host filesystem.
pub struct ZipFs {
    host: Arc<dyn VfsOps>,
    resolver: PathResolver,
    persister: Persister,
    empty_dirs: EmptyDirs,
    config: ZipFsConfig,
}

impl std::fmt::Debug for ZipFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFs")
            .field("resolver", &self.resolver)
            .field("empty_dirs", &self.empty_dirs)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ZipFs {
    /// Overlay `host` with ZIP archives.
    pub fn new(host: Arc<dyn VfsOps>, config: ZipFsConfig) -> Self {
        let codec = if config.compress {
            ZipCodec::new()
        } else {
            ZipCodec::stored()
        };
        Self::with_codec(host, Arc::new(codec), config)
    }

    /// Overlay `host` with archives in any format `codec` understands.
    pub fn with_codec(
        host: Arc<dyn VfsOps>,
        codec: Arc<dyn ArchiveCodec>,
        config: ZipFsConfig,
    ) -> Self {
        let cache = ArchiveCache::new(config.cache_ttl());
        Self {
            resolver: PathResolver::new(
                Arc::clone(&host),
                Arc::clone(&codec),
                cache,
                config.backup_suffix.clone(),
            ),
            persister: Persister::new(Arc::clone(&host), codec, config.backup_suffix.clone()),
            host,
            empty_dirs: EmptyDirs::new(),
            config,
        }
    }

    pub fn config(&self) -> &ZipFsConfig {
        &self.config
    }

    /// The decoded-archive cache.
    pub fn cache(&self) -> &ArchiveCache {
        self.resolver.cache()
    }

    /// Resolve `url` to a real path or an archive location.
    pub async fn resolve_path(&self, url: &str) -> VfsResult<ResolvedLocation> {
        self.resolver.resolve(url).await
    }

    /// Resolve `url` and report what lives there.
    pub async fn resolve(&self, url: &str) -> VfsResult<Resolved> {
        Ok(match self.node(url).await? {
            Node::Real(real) => Resolved::Passthrough(real),
            Node::File { data, .. } => Resolved::File(data),
            Node::Dir { children, .. } => Resolved::Directory(children),
        })
    }

    /// Persist the archive containing `url`, if it is resident.
    pub async fn flush(&self, url: &str) -> VfsResult<()> {
        let ResolvedLocation::InArchive { archive, .. } = self.resolver.resolve(url).await? else {
            return Err(VfsError::invalid_path(format!("{url} is not inside an archive")));
        };
        match self.cache().get(&archive) {
            Some(shared) => self.persister.persist(&archive, &shared).await,
            None => Ok(()),
        }
    }

    /// Drop the archive containing `url` from memory, along with its empty
    /// directories. Returns false if it was not resident.
    pub async fn close(&self, url: &str) -> VfsResult<bool> {
        let ResolvedLocation::InArchive { archive, .. } = self.resolver.resolve(url).await? else {
            return Err(VfsError::invalid_path(format!("{url} is not inside an archive")));
        };
        let resident = self.cache().remove(&archive).is_some();
        self.empty_dirs.remove_under(&archive);
        self.resolver.invalidate(&archive);
        tracing::info!(archive = %archive, resident, "closed archive");
        Ok(resident)
    }

    /// Start the background cache sweeper, unless disabled in the config.
    /// Must be called within a Tokio runtime.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let every = self.config.sweep_interval()?;
        let cache = self.cache();
        tracing::debug!(ttl = ?cache.ttl(), every = ?every, "starting archive sweeper");
        Some(cache.spawn_sweeper(every))
    }

    async fn node(&self, url: &str) -> VfsResult<Node> {
        let location = self.resolver.resolve(url).await?;
        let key = location.key();
        let (archive, internal) = match location {
            ResolvedLocation::Passthrough(real) => return Ok(Node::Real(real)),
            ResolvedLocation::InArchive { archive, internal } => (archive, internal),
        };

        let shared = self.resolver.load(&archive).await?;
        let listing = synthesize(&shared.read(), &internal, &key, &self.empty_dirs);
        match listing {
            Some(Listing::File(data)) => Ok(Node::File {
                archive,
                shared,
                entry: internal,
                key,
                data,
            }),
            Some(Listing::Directory(children)) => Ok(Node::Dir {
                archive,
                shared,
                dir: internal,
                key,
                children,
            }),
            None => Err(VfsError::not_found(url)),
        }
    }

    /// Apply `mutate` and persist. The in-memory archive is restored if
    /// persisting fails.
    async fn commit<F>(&self, archive: &str, shared: &SharedArchive, mutate: F) -> VfsResult<()>
    where
        F: FnOnce(&mut Archive) -> VfsResult<()> + Send,
    {
        let before = {
            let mut state = shared.write();
            let before = state.clone();
            mutate(&mut *state)?;
            before
        };

        if let Err(e) = self.persister.persist(archive, shared).await {
            tracing::warn!(archive = %archive, error = %e, "persist failed, rolling back");
            *shared.write() = before;
            return Err(e);
        }
        Ok(())
    }

    async fn is_real_dir(&self, real: &str) -> bool {
        self.host
            .stat(&path::to_file_url(real))
            .await
            .is_ok_and(|stat| stat.is_directory)
    }

    /// Drop resident archives stored at or under a real path that is gone.
    fn forget_archives_under(&self, real: &str) {
        for archive in self.cache().keys() {
            if path::strip_dir_prefix(&archive, real).is_some() {
                self.cache().remove(&archive);
                self.empty_dirs.remove_under(&archive);
            }
        }
    }

    /// Delete the archive file itself, together with its backup.
    async fn delete_archive(&self, archive: &str) -> VfsResult<()> {
        self.host.delete(&path::to_file_url(archive)).await?;
        let backup = path::to_file_url(&self.persister.backup_path(archive));
        if let Err(e) = self.host.delete(&backup).await {
            if !e.is_not_found() {
                tracing::warn!(backup = %backup, error = %e, "failed to delete backup");
            }
        }
        self.forget_archives_under(archive);
        tracing::info!(archive = %archive, "deleted archive");
        Ok(())
    }

    /// Work out where copying something named `name` to `destination` lands.
    async fn target(&self, name: &str, destination: &str) -> VfsResult<Target> {
        match self.node(destination).await {
            Ok(Node::Real(real)) => {
                if self.is_real_dir(&real).await {
                    Ok(Target::RealDir(real))
                } else {
                    Ok(Target::RealPath(real))
                }
            }
            Ok(Node::Dir {
                archive,
                shared,
                dir,
                key,
                ..
            }) => Ok(Target::Entry {
                archive,
                shared,
                internal: path::join(&dir, name),
                key: path::join(&key, name),
            }),
            Ok(Node::File {
                archive,
                shared,
                entry,
                key,
                ..
            }) => Ok(Target::Entry {
                archive,
                shared,
                internal: entry,
                key,
            }),
            Err(e) if e.is_not_found() => {
                let parent = path::dirname(destination).ok_or(e)?;
                let leaf = path::basename(destination);
                match self.node(&parent).await? {
                    Node::Real(real) => Ok(Target::RealPath(path::join(&real, leaf))),
                    Node::Dir {
                        archive,
                        shared,
                        dir,
                        key,
                        ..
                    } => Ok(Target::Entry {
                        archive,
                        shared,
                        internal: path::join(&dir, leaf),
                        key: path::join(&key, leaf),
                    }),
                    Node::File { .. } => Err(VfsError::not_a_directory(parent)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Write one entry, replacing any file already there.
    async fn put_entry(
        &self,
        archive: &str,
        shared: &SharedArchive,
        internal: String,
        key: &str,
        data: Vec<u8>,
    ) -> VfsResult<String> {
        let copied = path::to_virtual(key);
        self.commit(archive, shared, |state| {
            if state.has_dir(&internal) {
                return Err(VfsError::is_a_directory(copied.clone()));
            }
            state.insert(internal, data);
            Ok(())
        })
        .await?;
        self.empty_dirs.clear_ancestors(key);
        Ok(copied)
    }

    /// Copy every entry and empty directory under `dir` to `internal`.
    async fn copy_tree(
        &self,
        source: (&SharedArchive, &str, &str),
        archive: &str,
        shared: &SharedArchive,
        internal: String,
        key: &str,
    ) -> VfsResult<String> {
        let (source_archive, dir, source_key) = source;
        let files = source_archive.read().entries_under(dir);
        let markers = self.empty_dirs.descendants_of(source_key);
        let copied = path::to_virtual(key);

        if files.is_empty() {
            let (is_file, has_content) = {
                let state = shared.read();
                (state.contains(&internal), state.has_dir(&internal))
            };
            if is_file {
                return Err(VfsError::not_a_directory(copied));
            }
            if !has_content {
                self.empty_dirs.insert(key);
            }
        } else {
            let count = files.len();
            self.commit(archive, shared, |state| {
                if state.contains(&internal) {
                    return Err(VfsError::not_a_directory(copied.clone()));
                }
                for (rest, data) in files {
                    state.insert(path::join(&internal, &rest), data);
                }
                Ok(())
            })
            .await?;
            tracing::debug!(archive = %archive, to = %internal, count, "copied directory");
        }

        for marker in markers {
            self.empty_dirs.insert(path::join(key, &marker));
        }
        self.empty_dirs.clear_ancestors(key);
        Ok(copied)
    }
}

#[async_trait]
impl VfsOps for ZipFs {
    async fn stat(&self, url: &str) -> VfsResult<Stat> {
        match self.node(url).await? {
            Node::Real(real) => {
                let mut stat = self.host.stat(&path::to_file_url(&real)).await?;
                stat.url = url.to_string();
                Ok(stat)
            }
            Node::File { .. } => Ok(Stat::synthesized(path::basename(url), url, FileType::File)),
            Node::Dir { .. } => Ok(Stat::synthesized(
                path::basename(url),
                url,
                FileType::Directory,
            )),
        }
    }

    async fn ls_dir(&self, url: &str) -> VfsResult<Vec<Stat>> {
        match self.node(url).await? {
            Node::Real(real) => {
                let mut stats = self.host.ls_dir(&path::to_file_url(&real)).await?;
                for stat in &mut stats {
                    stat.url = path::join(url, &stat.name);
                }
                Ok(stats)
            }
            Node::Dir {
                shared,
                dir,
                children,
                ..
            } => {
                let state = shared.read();
                Ok(children
                    .into_iter()
                    .map(|name| {
                        let kind = if state.contains(&path::join(&dir, &name)) {
                            FileType::File
                        } else {
                            FileType::Directory
                        };
                        let child = path::join(url, &name);
                        Stat::synthesized(name, child, kind)
                    })
                    .collect())
            }
            Node::File { .. } => Err(VfsError::not_a_directory(url)),
        }
    }

    async fn read_file(&self, url: &str) -> VfsResult<Vec<u8>> {
        match self.node(url).await? {
            Node::Real(real) => self.host.read_file(&path::to_file_url(&real)).await,
            Node::File { data, .. } => Ok(data),
            Node::Dir { .. } => Err(VfsError::is_a_directory(url)),
        }
    }

    async fn write_file(&self, url: &str, content: &[u8]) -> VfsResult<()> {
        match self.node(url).await? {
            Node::Real(real) => self.host.write_file(&path::to_file_url(&real), content).await,
            Node::File {
                archive,
                shared,
                entry,
                ..
            } => {
                self.commit(&archive, &shared, |state| {
                    state.insert(entry, content.to_vec());
                    Ok(())
                })
                .await
            }
            Node::Dir { .. } => Err(VfsError::is_a_directory(url)),
        }
    }

    async fn create_file(&self, url: &str, name: &str, content: &[u8]) -> VfsResult<String> {
        let name = path::validate_name(name)?;
        let created = path::join(url, name);

        match self.node(url).await? {
            Node::Real(real) => {
                self.host
                    .create_file(&path::to_file_url(&real), name, content)
                    .await?;
            }
            Node::Dir {
                archive,
                shared,
                dir,
                key,
                ..
            } => {
                let entry = path::join(&dir, name);
                let entry_key = path::join(&key, name);
                let taken = self.empty_dirs.contains(&entry_key);
                self.commit(&archive, &shared, |state| {
                    if taken || state.contains(&entry) || state.has_dir(&entry) {
                        return Err(VfsError::already_exists(created.clone()));
                    }
                    state.insert(entry, content.to_vec());
                    Ok(())
                })
                .await?;
                self.empty_dirs.clear_ancestors(&entry_key);
                self.resolver.invalidate(&entry_key);
            }
            Node::File { .. } => return Err(VfsError::not_a_directory(url)),
        }
        Ok(created)
    }

    async fn create_directory(&self, url: &str, name: &str) -> VfsResult<String> {
        let name = path::validate_name(name)?;
        let created = path::join(url, name);

        match self.node(url).await? {
            Node::Real(real) => {
                self.host
                    .create_directory(&path::to_file_url(&real), name)
                    .await?;
            }
            Node::Dir {
                shared, dir, key, ..
            } => {
                let entry = path::join(&dir, name);
                let taken = {
                    let state = shared.read();
                    state.contains(&entry) || state.has_dir(&entry)
                };
                if taken || !self.empty_dirs.insert(path::join(&key, name)) {
                    return Err(VfsError::already_exists(created));
                }
                tracing::debug!(dir = %created, "registered empty directory");
            }
            Node::File { .. } => return Err(VfsError::not_a_directory(url)),
        }
        Ok(created)
    }

    async fn delete(&self, url: &str) -> VfsResult<()> {
        let removed = match self.node(url).await? {
            Node::Real(real) => {
                self.host.delete(&path::to_file_url(&real)).await?;
                self.forget_archives_under(&real);
                real
            }
            Node::Dir { archive, dir, .. } if dir.is_empty() => {
                self.delete_archive(&archive).await?;
                archive
            }
            Node::Dir {
                archive,
                shared,
                dir,
                key,
                ..
            } => {
                let has_entries = shared.read().has_dir(&dir);
                if has_entries {
                    self.commit(&archive, &shared, |state| {
                        let count = state.remove_dir(&dir);
                        tracing::debug!(archive = %archive, dir = %dir, count, "removed directory entries");
                        Ok(())
                    })
                    .await?;
                }
                self.empty_dirs.remove_under(&key);
                key
            }
            Node::File {
                archive,
                shared,
                entry,
                key,
                ..
            } => {
                self.commit(&archive, &shared, |state| {
                    state.remove(&entry);
                    Ok(())
                })
                .await?;
                key
            }
        };
        self.resolver.invalidate(&removed);
        Ok(())
    }

    async fn copy_to(&self, url: &str, destination: &str) -> VfsResult<String> {
        let destination = path::validate_destination(destination, "copy")?;
        let name = path::basename(url);
        let source = self.node(url).await?;
        let target = self.target(name, &destination).await?;

        let copied = match (source, target) {
            (Node::Real(from), Target::RealDir(to) | Target::RealPath(to)) => {
                let copied = self
                    .host
                    .copy_to(&path::to_file_url(&from), &path::to_file_url(&to))
                    .await?;
                path::to_virtual(path::real_path(&copied))
            }
            (
                Node::Real(from),
                Target::Entry {
                    archive,
                    shared,
                    internal,
                    key,
                },
            ) => {
                if self.is_real_dir(&from).await {
                    return Err(VfsError::unsupported("copying a real directory into an archive"));
                }
                let data = self.host.read_file(&path::to_file_url(&from)).await?;
                self.put_entry(&archive, &shared, internal, &key, data).await?
            }
            (
                Node::File { data, .. },
                Target::Entry {
                    archive,
                    shared,
                    internal,
                    key,
                },
            ) => self.put_entry(&archive, &shared, internal, &key, data).await?,
            (Node::File { data, .. }, Target::RealDir(dir)) => {
                let to = path::join(&dir, name);
                self.host.write_file(&path::to_file_url(&to), &data).await?;
                path::to_virtual(&to)
            }
            (Node::File { data, .. }, Target::RealPath(to)) => {
                self.host.write_file(&path::to_file_url(&to), &data).await?;
                path::to_virtual(&to)
            }
            (
                Node::Dir {
                    shared: source_archive,
                    dir,
                    key: source_key,
                    ..
                },
                Target::Entry {
                    archive,
                    shared,
                    internal,
                    key,
                },
            ) => {
                if path::strip_dir_prefix(&key, &source_key).is_some() {
                    return Err(VfsError::invalid_path(format!(
                        "cannot copy {url} into itself"
                    )));
                }
                self.copy_tree(
                    (&source_archive, dir.as_str(), source_key.as_str()),
                    &archive,
                    &shared,
                    internal,
                    &key,
                )
                .await?
            }
            // The archive root is the archive file itself.
            (Node::Dir { archive, dir, .. }, Target::RealDir(to) | Target::RealPath(to))
                if dir.is_empty() =>
            {
                let copied = self
                    .host
                    .copy_to(&path::to_file_url(&archive), &path::to_file_url(&to))
                    .await?;
                path::to_virtual(path::real_path(&copied))
            }
            (Node::Dir { .. }, Target::RealDir(_) | Target::RealPath(_)) => {
                return Err(VfsError::unsupported(
                    "copying an archive directory to the real filesystem",
                ));
            }
        };

        self.resolver.invalidate(&path::normalize(&copied));
        tracing::debug!(from = %url, to = %copied, "copied");
        Ok(copied)
    }

    async fn move_to(&self, url: &str, destination: &str) -> VfsResult<String> {
        let destination = path::validate_destination(destination, "move")?;
        let from = path::normalize(url);
        match path::strip_dir_prefix(&path::normalize(&destination), &from) {
            Some("") => return Ok(url.to_string()),
            Some(_) => {
                return Err(VfsError::invalid_path(format!("cannot move {url} into itself")));
            }
            None => {}
        }

        let moved = self.copy_to(url, &destination).await?;
        if path::normalize(&moved) != from {
            self.delete(url).await?;
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Entries;
    use crate::vfs::MemoryBackend;

    fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let entries: Entries = files
            .iter()
            .map(|(name, data)| (name.to_string(), data.as_bytes().to_vec()))
            .collect();
        ZipCodec::new().encode(&entries).unwrap()
    }

    fn setup() -> (Arc<MemoryBackend>, ZipFs) {
        let host = Arc::new(MemoryBackend::new());
        host.insert_file(
            "/file.zip",
            zip_bytes(&[("dir/test.txt", "hi"), ("dir/hello.txt", "yo")]),
        );
        host.insert_file("/plain.txt", "plain");
        let fs = ZipFs::new(host.clone(), ZipFsConfig::default());
        (host, fs)
    }

    fn children(names: &[&str]) -> Resolved {
        Resolved::Directory(names.iter().map(|n| n.to_string()).collect())
    }

    fn entries(host: &MemoryBackend, archive: &str) -> Entries {
        ZipCodec::new().decode(&host.file_bytes(archive).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_scenario() {
        let (_host, fs) = setup();
        assert_eq!(
            fs.resolve("zip:///file.zip/dir/test.txt").await.unwrap(),
            Resolved::File(b"hi".to_vec())
        );
        assert_eq!(
            fs.resolve("zip:///file.zip/dir/").await.unwrap(),
            children(&["hello.txt", "test.txt"])
        );
        assert!(fs.resolve("zip:///file.zip/missing.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_passthrough_read_write() {
        let (host, fs) = setup();
        assert_eq!(fs.read_to_string("zip:///plain.txt").await.unwrap(), "plain");

        fs.write_file("zip:///plain.txt", b"edited").await.unwrap();
        assert_eq!(host.file_bytes("/plain.txt").unwrap(), b"edited");
        assert!(fs.cache().is_empty());
    }

    #[tokio::test]
    async fn test_write_persists() {
        let (host, fs) = setup();
        let before = host.file_bytes("/file.zip").unwrap();

        fs.write_file("zip:///file.zip/dir/test.txt", b"bye").await.unwrap();
        assert_eq!(fs.read_file("zip:///file.zip/dir/test.txt").await.unwrap(), b"bye");
        assert_eq!(entries(&host, "/file.zip")["dir/test.txt"], b"bye");
        assert_eq!(host.file_bytes("/file.zip.backup").unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_backup_rolls_back() {
        let (host, fs) = setup();
        fs.read_file("zip:///file.zip/dir/test.txt").await.unwrap();
        host.set_fail_copies(true);

        let err = fs
            .write_file("zip:///file.zip/dir/test.txt", b"bye")
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::BackupFailure { .. }));
        assert_eq!(fs.read_file("zip:///file.zip/dir/test.txt").await.unwrap(), b"hi");
        assert_eq!(entries(&host, "/file.zip")["dir/test.txt"], b"hi");
    }

    #[tokio::test]
    async fn test_create_file_conflicts() {
        let (_host, fs) = setup();
        let created = fs
            .create_file("zip:///file.zip/dir", "new.txt", b"new")
            .await
            .unwrap();
        assert_eq!(created, "zip:///file.zip/dir/new.txt");

        let err = fs
            .create_file("zip:///file.zip/dir", "new.txt", b"again")
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));

        let err = fs
            .create_file("zip:///file.zip/dir/test.txt", "x", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_ls_dir_kinds() {
        let (_host, fs) = setup();
        fs.create_directory("zip:///file.zip/dir", "empty").await.unwrap();

        let stats = fs.ls_dir("zip:///file.zip/dir").await.unwrap();
        let summary: Vec<_> = stats
            .iter()
            .map(|s| (s.name.as_str(), s.is_directory, s.url.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("empty", true, "zip:///file.zip/dir/empty"),
                ("hello.txt", false, "zip:///file.zip/dir/hello.txt"),
                ("test.txt", false, "zip:///file.zip/dir/test.txt"),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_file_and_dir() {
        let (host, fs) = setup();
        fs.delete("zip:///file.zip/dir/test.txt").await.unwrap();
        assert_eq!(
            fs.resolve("zip:///file.zip/dir").await.unwrap(),
            children(&["hello.txt"])
        );

        fs.delete("zip:///file.zip/dir").await.unwrap();
        assert!(fs.resolve("zip:///file.zip/dir").await.unwrap_err().is_not_found());
        assert!(entries(&host, "/file.zip").is_empty());
    }

    #[tokio::test]
    async fn test_delete_archive_root_removes_file() {
        let (host, fs) = setup();
        fs.write_file("zip:///file.zip/dir/test.txt", b"x").await.unwrap();
        assert!(host.file_bytes("/file.zip.backup").is_some());

        fs.delete("zip:///file.zip").await.unwrap();
        assert!(host.file_bytes("/file.zip").is_none());
        assert!(host.file_bytes("/file.zip.backup").is_none());
        assert!(fs.cache().is_empty());
        assert!(!fs.exists("zip:///file.zip/dir").await);
    }

    #[tokio::test]
    async fn test_copy_matrix() {
        let (host, fs) = setup();
        host.insert_file("/other.zip", zip_bytes(&[("keep.txt", "k")]));

        // archive file -> archive directory (other archive root)
        let copied = fs
            .copy_to("zip:///file.zip/dir/test.txt", "zip:///other.zip")
            .await
            .unwrap();
        assert_eq!(copied, "zip:///other.zip/test.txt");

        // archive file -> archive file
        fs.copy_to("zip:///file.zip/dir/hello.txt", "zip:///other.zip/keep.txt")
            .await
            .unwrap();
        assert_eq!(entries(&host, "/other.zip")["keep.txt"], b"yo");

        // archive directory -> archive, as a new name
        fs.copy_to("zip:///file.zip/dir", "zip:///other.zip/copy").await.unwrap();
        let other = entries(&host, "/other.zip");
        assert_eq!(other["copy/test.txt"], b"hi");
        assert_eq!(other["copy/hello.txt"], b"yo");

        // real file -> archive
        fs.copy_to("zip:///plain.txt", "zip:///file.zip/dir").await.unwrap();
        assert_eq!(entries(&host, "/file.zip")["dir/plain.txt"], b"plain");

        // archive file -> real, into a directory and as a new path
        host.insert_file("/out/keep.txt", "k");
        let copied = fs
            .copy_to("zip:///file.zip/dir/test.txt", "/out")
            .await
            .unwrap();
        assert_eq!(copied, "zip:///out/test.txt");
        fs.copy_to("zip:///file.zip/dir/hello.txt", "file:///out/renamed.txt")
            .await
            .unwrap();
        assert_eq!(host.file_bytes("/out/test.txt").unwrap(), b"hi");
        assert_eq!(host.file_bytes("/out/renamed.txt").unwrap(), b"yo");

        // archive directory -> real
        let err = fs.copy_to("zip:///file.zip/dir", "zip:///out").await.unwrap_err();
        assert!(matches!(err, VfsError::Unsupported(_)));

        // foreign scheme
        let err = fs
            .copy_to("zip:///file.zip/dir/test.txt", "http://example.com/x")
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_move_and_rename() {
        let (host, fs) = setup();
        let renamed = fs
            .rename_to("zip:///file.zip/dir/test.txt", "renamed.txt")
            .await
            .unwrap();
        assert_eq!(renamed, "zip:///file.zip/dir/renamed.txt");

        let archive = entries(&host, "/file.zip");
        assert!(!archive.contains_key("dir/test.txt"));
        assert_eq!(archive["dir/renamed.txt"], b"hi");

        let err = fs
            .move_to("zip:///file.zip/dir", "zip:///file.zip/dir/sub")
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_rename_archive_file() {
        let (host, fs) = setup();
        host.insert_file("/a/file.zip", host.file_bytes("/file.zip").unwrap());

        let renamed = fs.rename_to("zip:///a/file.zip", "renamed.zip").await.unwrap();
        assert_eq!(renamed, "zip:///a/renamed.zip");
        assert!(host.file_bytes("/a/file.zip").is_none());
        assert_eq!(
            fs.resolve("zip:///a/renamed.zip/dir/test.txt").await.unwrap(),
            Resolved::File(b"hi".to_vec())
        );
    }

    #[tokio::test]
    async fn test_flush_and_close() {
        let (host, fs) = setup();
        fs.read_file("zip:///file.zip/dir/test.txt").await.unwrap();
        assert!(fs.cache().contains("/file.zip"));

        fs.flush("zip:///file.zip").await.unwrap();
        assert!(host.file_bytes("/file.zip.backup").is_some());

        assert!(fs.close("zip:///file.zip/dir").await.unwrap());
        assert!(!fs.cache().contains("/file.zip"));
        assert!(matches!(
            fs.flush("zip:///plain.txt").await,
            Err(VfsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_dir_to_same_name() {
        let (host, fs) = setup();
        let renamed = fs.rename_to("zip:///file.zip/dir", "dir").await.unwrap();
        assert_eq!(renamed, "zip:///file.zip/dir");
        assert_eq!(
            fs.resolve("zip:///file.zip/dir").await.unwrap(),
            children(&["hello.txt", "test.txt"])
        );
        assert_eq!(entries(&host, "/file.zip").len(), 2);

        let err = fs
            .copy_to("zip:///file.zip/dir", "zip:///file.zip/dir")
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
        assert_eq!(entries(&host, "/file.zip").len(), 2);
    }

    #[tokio::test]
    async fn test_copy_empty_dir_onto_populated_dir() {
        let (host, fs) = setup();
        host.insert_file(
            "/file.zip",
            zip_bytes(&[("dir/test.txt", "hi"), ("x/fresh/keep.txt", "k")]),
        );
        fs.create_directory("zip:///file.zip/dir", "fresh").await.unwrap();

        let copied = fs
            .copy_to("zip:///file.zip/dir/fresh", "zip:///file.zip/x")
            .await
            .unwrap();
        assert_eq!(copied, "zip:///file.zip/x/fresh");
        assert_eq!(
            fs.resolve("zip:///file.zip/x/fresh").await.unwrap(),
            children(&["keep.txt"])
        );
        assert!(fs.exists("zip:///file.zip/x/fresh/keep.txt").await);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_empty_dirs() {
        let (host, fs) = setup();
        fs.create_directory("zip:///file.zip/dir", "empty").await.unwrap();
        host.set_fail_copies(true);

        let err = fs.delete("zip:///file.zip/dir").await.unwrap_err();
        assert!(matches!(err, VfsError::BackupFailure { .. }));
        assert_eq!(
            fs.resolve("zip:///file.zip/dir").await.unwrap(),
            children(&["empty", "hello.txt", "test.txt"])
        );
        assert_eq!(
            fs.resolve("zip:///file.zip/dir/empty").await.unwrap(),
            children(&[])
        );
    }

    #[tokio::test]
    async fn test_uncompressed_write_back() {
        let host = Arc::new(MemoryBackend::new());
        host.insert_file("/file.zip", zip_bytes(&[("a.txt", "aaaaaaaaaaaaaaaa")]));
        let fs = ZipFs::new(host.clone(), ZipFsConfig::default().with_compression(false));

        fs.write_file("zip:///file.zip/a.txt", b"bbbbbbbbbbbbbbbb").await.unwrap();
        let bytes = host.file_bytes("/file.zip").unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let file = archive.by_name("a.txt").unwrap();
        assert_eq!(file.compression(), zip::CompressionMethod::Stored);
        assert_eq!(file.size(), 16);
    }
}

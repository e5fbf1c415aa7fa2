//! # zipfs
//!
//! Archive overlay filesystem: browse and edit the contents of ZIP files as
//! if they were directories.
//!
//! A `zip://` url names either something on the real filesystem or a
//! location inside an archive file somewhere along the path. Which one is
//! discovered on first access and remembered:
//! - Real files and directories are passed through to the host filesystem
//! - Archives are decoded once and kept in memory while in use
//! - Every edit is written back to the archive, after snapshotting the
//!   previous file as `<archive>.backup`
//! - A corrupt or missing archive is recovered from its backup
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipfs::{LocalBackend, VfsOps, ZipFs, ZipFsConfig};
//!
//! # async fn demo() -> zipfs::VfsResult<()> {
//! let host = Arc::new(LocalBackend::new("/srv/workspace"));
//! let fs = ZipFs::new(host, ZipFsConfig::default());
//!
//! let text = fs.read_to_string("zip:///bundle.zip/docs/readme.txt").await?;
//! fs.write_file("zip:///bundle.zip/docs/readme.txt", text.to_uppercase().as_bytes())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod codec;
pub mod config;
pub mod engine;
pub mod path;
pub mod plugin;
pub mod vfs;

pub use archive::{ArchiveCache, ResolvedLocation};
pub use codec::{ArchiveCodec, CodecError, Entries, ZipCodec};
pub use config::{ConfigError, ZipFsConfig};
pub use engine::{Resolved, ZipFs};
pub use plugin::ZipFsPlugin;
pub use vfs::{
    backends::{LocalBackend, MemoryBackend},
    Encoding, ExtensionRegistry, FileContent, FileType, ScopedFs, Stat, VfsError, VfsOps,
    VfsResult,
};

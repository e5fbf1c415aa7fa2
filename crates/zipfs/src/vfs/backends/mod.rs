//! VFS backends.
//!
//! Backends implement [`VfsOps`](crate::vfs::VfsOps) for real storage. They
//! serve both as the passthrough bridge for non-archive paths and as the
//! source of raw archive bytes.

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;

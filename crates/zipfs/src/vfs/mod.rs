//! Virtual Filesystem abstraction.
//!
//! Key components:
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`ScopedFs`] - The same operation set bound to one url
//! - [`ExtensionRegistry`] - Routes urls to filesystems by scheme prefix
//! - [`LocalBackend`] - Real filesystem access (with path security)
//! - [`MemoryBackend`] - In-memory filesystem (for testing)
//!
//! ## Design Decisions
//!
//! - **Url-based, whole-file**: Operations take the url they act on and move
//!   whole files. There are no handles or offsets.
//! - **Longest-prefix routing**: the registry routes to the most specific
//!   registered prefix that matches.

pub mod backends;
mod error;
mod ops;
mod registry;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{VfsError, VfsResult};
pub use ops::{ScopedFs, VfsOps};
pub use registry::{ExtensionRegistry, FsFactory};
pub use types::{Encoding, FileContent, FileType, Stat};

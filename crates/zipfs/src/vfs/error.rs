//! Errors shared by the overlay and its host backends.

use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

/// Error kinds reported by [`crate::VfsOps`] implementations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Resolution exhausted the upward search, or the entry is missing.
    #[error("file does not exist: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A file where a directory was required.
    #[error("file is not a directory: {0}")]
    NotADirectory(String),

    /// A directory where a file was required.
    #[error("file is a directory: {0}")]
    IsADirectory(String),

    /// Archive bytes are malformed and no usable backup was found.
    #[error("cannot decode archive {path}: {reason}")]
    DecodeFailure {
        /// Real path of the archive file.
        path: String,
        /// Codec message.
        reason: String,
    },

    /// The on-disk archive could not be snapshotted before an overwrite.
    #[error("failed to back up archive file: {path}")]
    BackupFailure {
        /// Real path of the archive file.
        path: String,
        /// Why the snapshot copy failed.
        #[source]
        source: Box<VfsError>,
    },

    /// Operation or kind combination not implemented.
    #[error("{0} is not supported")]
    Unsupported(String),

    /// Invalid path or name.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Path escapes the backend root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Host I/O failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// Content is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Content is not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("{0}")]
    Other(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn decode_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::DecodeFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a BackupFailure error wrapping the failed copy.
    pub fn backup_failure(path: impl Into<String>, source: VfsError) -> Self {
        Self::BackupFailure {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns true for the NotFound kind, including wrapped I/O not-found.
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            e @ VfsError::DecodeFailure { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            }
            e @ VfsError::BackupFailure { .. } => io::Error::other(e.to_string()),
            VfsError::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::Io(e) => e,
            VfsError::Json(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            VfsError::Utf8(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            VfsError::Other(msg) => io::Error::other(msg),
        }
    }
}

pub type VfsResult<T> = Result<T, VfsError>;

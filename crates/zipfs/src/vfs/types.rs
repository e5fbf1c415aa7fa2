//! Core VFS types.
//!
//! These mirror what the host editor expects back from any filesystem:
//! a flat `Stat` record per path, plus optional decoding of file bytes.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use strum::{Display, EnumString};

use super::{VfsError, VfsResult};

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Metadata for one path, as reported to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stat {
    /// Base name of the path.
    pub name: String,
    /// The url this record describes.
    pub url: String,
    /// Regular file.
    pub is_file: bool,
    /// Directory (real or synthesized).
    pub is_directory: bool,
    /// Symbolic link. Always false inside archives.
    pub is_link: bool,
    /// Size in bytes. Archive entries report 0.
    pub size: u64,
    /// Last modification time. Archive entries report the time of the stat call.
    pub modified_date: SystemTime,
    /// Readable by the current user.
    pub can_read: bool,
    /// Writable by the current user.
    pub can_write: bool,
}

impl Stat {
    /// Placeholder record for something inside an archive.
    ///
    /// Size and modification time are not tracked for archive entries.
    pub fn synthesized(name: impl Into<String>, url: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            is_file: kind.is_file(),
            is_directory: kind.is_dir(),
            is_link: false,
            size: 0,
            modified_date: SystemTime::now(),
            can_read: true,
            can_write: true,
        }
    }
}

/// How file bytes should be decoded on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Encoding {
    /// UTF-8 text.
    #[strum(to_string = "utf-8", serialize = "utf8")]
    Utf8,
    /// UTF-8 text parsed as JSON.
    #[strum(to_string = "json")]
    Json,
}

/// File content, decoded according to an optional [`Encoding`].
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    /// Raw bytes (no encoding requested).
    Bytes(Vec<u8>),
    /// Decoded UTF-8 text.
    Text(String),
    /// Parsed JSON value.
    Json(serde_json::Value),
}

impl FileContent {
    /// Decode raw bytes according to `encoding`.
    pub fn decode(bytes: Vec<u8>, encoding: Option<Encoding>) -> VfsResult<Self> {
        match encoding {
            None => Ok(FileContent::Bytes(bytes)),
            Some(Encoding::Utf8) => Ok(FileContent::Text(String::from_utf8(bytes)?)),
            Some(Encoding::Json) => Ok(FileContent::Json(serde_json::from_slice(&bytes)?)),
        }
    }

    /// Raw bytes, re-encoding text or JSON when needed.
    pub fn into_bytes(self) -> VfsResult<Vec<u8>> {
        match self {
            FileContent::Bytes(bytes) => Ok(bytes),
            FileContent::Text(text) => Ok(text.into_bytes()),
            FileContent::Json(value) => serde_json::to_vec(&value).map_err(VfsError::from),
        }
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        FileContent::Bytes(bytes)
    }
}

impl From<&[u8]> for FileContent {
    fn from(bytes: &[u8]) -> Self {
        FileContent::Bytes(bytes.to_vec())
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        FileContent::Text(text)
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        FileContent::Text(text.to_string())
    }
}

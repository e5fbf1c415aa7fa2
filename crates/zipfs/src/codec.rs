//! Archive codec.
//!
//! An archive is a flat map from entry name to bytes. The codec turns raw
//! file bytes into that map and back; nothing else in the crate knows the
//! container format.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Entry name → payload. Names are `/`-separated and relative; a trailing
/// `/` marks an explicit directory record.
pub type Entries = BTreeMap<String, Vec<u8>>;

/// Codec error type.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Bytes are not a readable archive.
    #[error("malformed archive: {0}")]
    Malformed(String),

    /// Archive could not be written.
    #[error("cannot encode archive: {0}")]
    Encode(String),

    /// I/O error while streaming entries.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for CodecError {
    fn from(e: zip::result::ZipError) -> Self {
        CodecError::Malformed(e.to_string())
    }
}

/// Converts between raw archive bytes and an entry map.
pub trait ArchiveCodec: Send + Sync {
    /// Decode raw bytes. Fails on malformed input.
    fn decode(&self, bytes: &[u8]) -> Result<Entries, CodecError>;

    /// Encode an entry map to raw bytes.
    fn encode(&self, entries: &Entries) -> Result<Vec<u8>, CodecError>;
}

/// ZIP codec. Entries are written deflated.
#[derive(Debug, Clone, Copy)]
pub struct ZipCodec {
    method: CompressionMethod,
}

impl Default for ZipCodec {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Deflated,
        }
    }
}

impl ZipCodec {
    /// Create a codec writing deflated entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec writing uncompressed entries.
    pub fn stored() -> Self {
        Self {
            method: CompressionMethod::Stored,
        }
    }
}

impl ArchiveCodec for ZipCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Entries, CodecError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Entries::new();

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let name = file.name().to_string();
            let mut data = Vec::new();
            if !file.is_dir() {
                file.read_to_end(&mut data)?;
            }
            entries.insert(name, data);
        }
        Ok(entries)
    }

    fn encode(&self, entries: &Entries) -> Result<Vec<u8>, CodecError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(self.method);

        for (name, data) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(name.as_str(), options)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            } else {
                writer
                    .start_file(name.as_str(), options)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
                writer.write_all(data)?;
            }
        }

        let cursor = writer
            .finish()
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

//! Error types for aiomerge

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, MergeError>;

/// Errors produced while building or inspecting AIO container images
#[derive(Debug, Error)]
pub enum MergeError {
    /// A source file could not be opened or read; the whole merge is
    /// aborted and nothing is written.
    #[error("cannot read source file '{path}': {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination could not be written; no partial output file is
    /// left behind.
    #[error("cannot write destination file '{path}': {source}")]
    DestinationWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A merge was requested with an empty entry list
    #[error("at least one source file is required")]
    NoEntries,

    /// More entries than the one-byte count field can describe
    #[error("too many entries: {count} (maximum {max})")]
    TooManyEntries { count: usize, max: usize },

    /// A source file is larger than the 4-byte size field can record
    #[error("source file '{path}' is too large: {size} bytes (maximum {max})")]
    EntryTooLarge { path: PathBuf, size: u64, max: u32 },

    /// An entry's end position does not fit the 4-byte offset field
    #[error("entry at offset {offset:#x} with size {size:#x} exceeds the 4 GiB image limit")]
    ImageTooLarge { offset: u32, size: u32 },

    /// Image does not start with the AIO magic
    #[error("invalid magic: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic { expected: [u8; 4], found: [u8; 4] },

    /// Image carries an unknown format version
    #[error("unsupported header version {found:#06x} (expected {expected:#06x})")]
    UnsupportedVersion { expected: u16, found: u16 },

    /// Image is shorter than its headers require
    #[error("image truncated: {len} bytes, need at least {need}")]
    TruncatedImage { len: usize, need: usize },

    /// Image headers are structurally inconsistent
    #[error("invalid image data: {0}")]
    InvalidImageData(String),

    /// A recorded CRC does not match the data in its window
    #[error("CRC mismatch for entry {index}: header {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        index: usize,
        expected: u32,
        computed: u32,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    /// Create a SourceRead error
    pub fn source_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceRead {
            path: path.into(),
            source,
        }
    }

    /// Create a DestinationWrite error
    pub fn destination_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DestinationWrite {
            path: path.into(),
            source,
        }
    }

    /// Create an InvalidImageData error
    pub fn invalid_image_data(msg: impl Into<String>) -> Self {
        Self::InvalidImageData(msg.into())
    }
}

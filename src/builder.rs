//! Merge engine: compose firmware binaries into an AIO container image
//!
//! A merge is one stateless batch transform. Five stages run in strict
//! sequence over the input list: header layout, offset resolution, payload
//! composition, CRC computation, header serialization. Composition finishes
//! for every entry before the first CRC is computed — checksums describe the
//! final, fully overlapped content, so an entry overwritten by a later one
//! records the CRC of the bytes that won. Headers are serialized last and
//! unconditionally overwrite any payload bytes in the leading region.

use crate::crc::calculate_crc32;
use crate::error::{MergeError, Result};
use crate::headers::{ContainerHeader, EntryHeader};
use crate::layout::{OffsetResolver, header_size_for_count, validate_entry_count};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One caller-supplied merge target: a source path plus an optional explicit
/// placement offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInput {
    pub path: PathBuf,
    pub offset: Option<u32>,
}

impl MergeInput {
    /// An auto-append target.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: None,
        }
    }

    /// A target with an explicit placement offset.
    pub fn with_offset(path: impl Into<PathBuf>, offset: u32) -> Self {
        Self {
            path: path.into(),
            offset: Some(offset),
        }
    }
}

/// A fully resolved entry of a built image.
///
/// Offset, size and CRC are filled in by the engine during the merge and
/// never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEntry {
    pub path: PathBuf,
    pub requested_offset: Option<u32>,
    pub offset: u32,
    pub size: u32,
    pub crc: u32,
}

/// Summary of a committed merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub header_size: u32,
    pub total_size: u32,
}

/// Builder accumulating merge targets in input order.
///
/// Order matters twice: auto-append placement follows the previously
/// resolved entry, and on overlap the later target's bytes win.
#[derive(Debug, Clone, Default)]
pub struct MergeBuilder {
    inputs: Vec<MergeInput>,
}

impl MergeBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an auto-append source.
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(MergeInput::new(path));
        self
    }

    /// Append a source with an explicit placement offset.
    pub fn source_at(mut self, path: impl Into<PathBuf>, offset: u32) -> Self {
        self.inputs.push(MergeInput::with_offset(path, offset));
        self
    }

    /// Append an already-constructed input.
    pub fn add(&mut self, input: MergeInput) {
        self.inputs.push(input);
    }

    /// The accumulated inputs, in placement order.
    pub fn inputs(&self) -> &[MergeInput] {
        &self.inputs
    }

    /// Run the merge in memory.
    ///
    /// Every source is read up front, so an unreadable file aborts the merge
    /// before any composition happens.
    pub fn build(&self) -> Result<MergedImage> {
        validate_entry_count(self.inputs.len())?;
        let header_size = header_size_for_count(self.inputs.len());

        let mut payloads = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let data =
                fs::read(&input.path).map_err(|e| MergeError::source_read(&input.path, e))?;
            if data.len() as u64 > u32::MAX as u64 {
                return Err(MergeError::EntryTooLarge {
                    path: input.path.clone(),
                    size: data.len() as u64,
                    max: u32::MAX,
                });
            }
            payloads.push(data);
        }

        let mut resolver = OffsetResolver::new(header_size);
        let mut entries = Vec::with_capacity(self.inputs.len());
        for (input, data) in self.inputs.iter().zip(&payloads) {
            let size = data.len() as u32;
            let offset = resolver.resolve(input.offset, size)?;
            entries.push(MergeEntry {
                path: input.path.clone(),
                requested_offset: input.offset,
                offset,
                size,
                crc: 0,
            });
        }

        // resolve() bounded every end position to u32 already
        let total_size = entries
            .iter()
            .map(|e| e.offset as u64 + e.size as u64)
            .fold(header_size as u64, u64::max);
        let mut bytes = vec![0u8; total_size as usize];

        // composition pass: input order, later entries overwrite earlier ones
        for (entry, data) in entries.iter().zip(&payloads) {
            let start = entry.offset as usize;
            bytes[start..start + data.len()].copy_from_slice(data);
        }

        // checksum pass over the final content, kept separate from composition
        for entry in &mut entries {
            let start = entry.offset as usize;
            let end = start + entry.size as usize;
            entry.crc = calculate_crc32(&bytes[start..end]);
        }

        // headers win over any payload bytes in the leading region
        let mut region = &mut bytes[..header_size as usize];
        ContainerHeader::new(entries.len() as u8, header_size as u16).write_to(&mut region)?;
        for entry in &entries {
            EntryHeader::new(entry.offset, entry.size, entry.crc).write_to(&mut region)?;
        }

        Ok(MergedImage {
            bytes,
            header_size,
            entries,
        })
    }
}

/// A fully composited AIO container image.
#[derive(Debug, Clone)]
pub struct MergedImage {
    bytes: Vec<u8>,
    header_size: u32,
    entries: Vec<MergeEntry>,
}

impl MergedImage {
    /// The complete image content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the header region at the start of the image.
    pub fn header_size(&self) -> u32 {
        self.header_size
    }

    /// Total image size in bytes.
    pub fn total_size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// The resolved entries, in input order.
    pub fn entries(&self) -> &[MergeEntry] {
        &self.entries
    }

    /// The (header size, total size) summary.
    pub fn report(&self) -> MergeReport {
        MergeReport {
            header_size: self.header_size,
            total_size: self.total_size(),
        }
    }

    /// Write the image to `path`.
    ///
    /// The buffer goes to a temporary file in the destination directory
    /// first and is renamed into place, so a failed write never leaves a
    /// partial destination file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let attempt = |dir: &Path| -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            tmp.write_all(&self.bytes)?;
            tmp.flush()?;
            tmp.persist(path).map_err(|e| e.error)?;
            Ok(())
        };
        attempt(dir).map_err(|e| MergeError::destination_write(path, e))
    }
}

/// Merge `inputs` into an AIO container image written at `output`.
///
/// Returns the header region size and total image size. Any unreadable
/// source aborts the merge before composition; a destination failure leaves
/// no partial output file.
pub fn merge_binaries(inputs: &[MergeInput], output: impl AsRef<Path>) -> Result<MergeReport> {
    let mut builder = MergeBuilder::new();
    for input in inputs {
        builder.add(input.clone());
    }
    let image = builder.build()?;
    image.write_to_file(output)?;
    Ok(image.report())
}

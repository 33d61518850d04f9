//! # aiomerge
//!
//! Merge independent firmware binaries into a single AIO container image.
//!
//! An AIO image starts with a fixed 32-byte container header followed by one
//! 80-byte entry header per embedded firmware; the payload region begins
//! where the headers end. Placement is resolved strictly in input order:
//! entries without an explicit offset are appended after the end of the last
//! resolved entry, explicit offsets below the header region are clamped up
//! to it, and explicit offsets at or beyond it are honored verbatim even
//! when they overlap earlier entries. On overlap the later entry's bytes
//! win, and every entry's CRC-32 describes the bytes that finally occupy its
//! window.
//!
//! ## Example
//!
//! ```no_run
//! use aiomerge::MergeBuilder;
//!
//! let image = MergeBuilder::new()
//!     .source("bootloader.bin")
//!     .source_at("app.bin", 0x2000)
//!     .build()?;
//! image.write_to_file("update.aio")?;
//! # Ok::<(), aiomerge::MergeError>(())
//! ```

pub mod builder;
pub mod cli;
pub mod crc;
pub mod error;
pub mod headers;
pub mod layout;
pub mod preflight;

// Re-export main types for convenience
pub use builder::{MergeBuilder, MergeEntry, MergeInput, MergeReport, MergedImage, merge_binaries};
pub use crc::calculate_crc32;
pub use error::{MergeError, Result};
pub use headers::{ContainerHeader, DeviceIdentity, EntryHeader, read_headers};
pub use layout::{OffsetResolver, header_size_for_count};

/// Current version of the aiomerge implementation
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic bytes at the start of every AIO container image
pub const AIO_MAGIC: [u8; 4] = *b"AIOH";

/// Container header size in bytes
pub const CONTAINER_HEADER_SIZE: usize = 0x20;

/// Per-entry header size in bytes
pub const ENTRY_HEADER_SIZE: usize = 0x50;

/// Maximum number of entries a container can describe (one-byte count field)
pub const MAX_ENTRY_COUNT: usize = 0xFF;

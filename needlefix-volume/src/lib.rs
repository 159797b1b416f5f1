//! # needlefix-volume
//!
//! Volume data log format for needlefix.
//!
//! A volume is a single append-only `.dat` file:
//! - A superblock recording the format version
//! - A sequence of 8-byte aligned needles (header + body)
//! - Deletions appended as tombstone needles, never in-place rewrites
//!
//! This crate decodes and scans that log sequentially and can append to it.

pub mod error;
pub mod needle;
pub mod scan;
pub mod superblock;
pub mod writer;

pub use error::VolumeError;
pub use needle::{Cookie, Needle, NeedleId, Size, TOMBSTONE_FILE_SIZE};
pub use scan::{scan_volume_file, scan_volume_path, ScanSummary, VisitResult, VolumeFileScanner};
pub use superblock::{SuperBlock, Version};
pub use writer::VolumeWriter;

/// Data log file extension.
pub const DATA_FILE_EXTENSION: &str = "dat";

/// Needles start and end on this boundary.
pub const NEEDLE_PADDING_SIZE: u64 = 8;

/// Needle header size in bytes: cookie (4) + id (8) + size (4).
pub const NEEDLE_HEADER_SIZE: usize = 16;

/// Volume identifier.
pub type VolumeId = u32;

/// Returns the data file name stem for a volume: `[<collection>_]<vid>`.
pub fn volume_file_stem(collection: &str, volume_id: VolumeId) -> String {
    if collection.is_empty() {
        volume_id.to_string()
    } else {
        format!("{}_{}", collection, volume_id)
    }
}

/// Rounds `len` up to the needle alignment.
pub fn padded_len(len: u64) -> u64 {
    len.div_ceil(NEEDLE_PADDING_SIZE) * NEEDLE_PADDING_SIZE
}

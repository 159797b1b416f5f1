//! Sequential volume scanning.
//!
//! The scanner reads the superblock once and then walks needles in append
//! order, handing each decoded header to a [`VolumeFileScanner`]. Needle
//! bodies are skipped with a relative seek unless the visitor asks for them.

use crate::error::VolumeError;
use crate::needle::{body_len, Needle};
use crate::superblock::{SuperBlock, Version, SUPER_BLOCK_SIZE};
use crate::{volume_file_stem, VolumeId, DATA_FILE_EXTENSION, NEEDLE_HEADER_SIZE};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Result type returned by visitor callbacks.
pub type VisitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receives the contents of a volume during a scan.
pub trait VolumeFileScanner {
    /// Called once with the volume superblock before any needle.
    fn visit_super_block(&mut self, super_block: &SuperBlock) -> VisitResult;

    /// Whether needle bodies should be read and checksummed.
    fn read_needle_body(&self) -> bool;

    /// Called for every needle in log order. `offset` is the needle's byte
    /// offset in the data file.
    fn visit_needle(&mut self, needle: &Needle, offset: u64) -> VisitResult;
}

/// Outcome of a completed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    /// Needle format version from the superblock.
    pub version: Version,
    /// Number of needles handed to the visitor.
    pub needles: u64,
    /// Offset just past the last complete needle.
    pub end_offset: u64,
    /// Bytes of an incomplete trailing needle that were ignored.
    pub truncated_bytes: u64,
}

/// Scans `<dir>/[<collection>_]<volume_id>.dat`.
pub fn scan_volume_file<S: VolumeFileScanner + ?Sized>(
    dir: &Path,
    collection: &str,
    volume_id: VolumeId,
    scanner: &mut S,
) -> Result<ScanSummary, VolumeError> {
    let path = dir.join(format!(
        "{}.{}",
        volume_file_stem(collection, volume_id),
        DATA_FILE_EXTENSION
    ));
    scan_volume_path(&path, scanner)
}

/// Scans the data file at `path`.
pub fn scan_volume_path<S: VolumeFileScanner + ?Sized>(
    path: &Path,
    scanner: &mut S,
) -> Result<ScanSummary, VolumeError> {
    let file = File::open(path).map_err(|source| VolumeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let super_block = read_super_block(&mut reader)?;
    let version = super_block.version;
    let mut offset = super_block.disk_size();
    let read_so_far = (SUPER_BLOCK_SIZE + super_block.extra.len()) as u64;
    reader.seek_relative((offset - read_so_far) as i64)?;

    tracing::debug!(
        "Scanning {} ({} bytes, version {})",
        path.display(),
        file_len,
        version
    );

    scanner
        .visit_super_block(&super_block)
        .map_err(|source| VolumeError::VisitorAborted { offset: 0, source })?;

    let mut summary = ScanSummary {
        version,
        needles: 0,
        end_offset: offset,
        truncated_bytes: 0,
    };
    let mut header = [0u8; NEEDLE_HEADER_SIZE];

    while offset < file_len {
        let remaining = file_len - offset;
        if remaining < NEEDLE_HEADER_SIZE as u64 {
            summary.truncated_bytes = remaining;
            break;
        }

        reader.read_exact(&mut header)?;
        let mut needle = Needle::parse_header(&header);

        let body_len = body_len(needle.size, version);
        if NEEDLE_HEADER_SIZE as u64 + body_len > remaining {
            summary.truncated_bytes = remaining;
            break;
        }

        if scanner.read_needle_body() {
            let mut body = vec![0u8; body_len as usize];
            reader.read_exact(&mut body)?;
            needle.read_body(Bytes::from(body), version, offset)?;
        } else {
            reader.seek_relative(body_len as i64)?;
        }

        tracing::trace!(
            "needle {} at offset {} size {} disk_size {}",
            needle.id,
            offset,
            needle.size,
            NEEDLE_HEADER_SIZE as u64 + body_len
        );

        scanner
            .visit_needle(&needle, offset)
            .map_err(|source| VolumeError::VisitorAborted { offset, source })?;

        offset += NEEDLE_HEADER_SIZE as u64 + body_len;
        summary.needles += 1;
        summary.end_offset = offset;
    }

    if summary.truncated_bytes > 0 {
        tracing::warn!(
            "Ignoring incomplete needle at offset {} in {} ({} bytes)",
            summary.end_offset,
            path.display(),
            summary.truncated_bytes
        );
    }

    Ok(summary)
}

fn read_super_block<R: Read>(reader: &mut R) -> Result<SuperBlock, VolumeError> {
    let mut fixed = [0u8; SUPER_BLOCK_SIZE];
    reader.read_exact(&mut fixed).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => VolumeError::InvalidSuperBlock("file too short".to_string()),
        _ => VolumeError::Io(e),
    })?;

    let (mut super_block, extra_size) = SuperBlock::decode_fixed(&fixed)?;
    if extra_size > 0 {
        let mut extra = vec![0u8; extra_size as usize];
        reader.read_exact(&mut extra).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                VolumeError::InvalidSuperBlock("truncated extra section".to_string())
            }
            _ => VolumeError::Io(e),
        })?;
        super_block.extra = Bytes::from(extra);
    }

    Ok(super_block)
}

//! Index file format.
//!
//! An index file is a flat sequence of fixed-size entries:
//!
//! ```text
//! +---------------------+----------+----------+
//! | key                 | offset   | size     |
//! | 8 bytes             | 4 bytes  | 4 bytes  |
//! +---------------------+----------+----------+
//! ```
//!
//! `offset` is in units of the needle padding size. All fields are big-endian.
//! A needle map entry whose byte offset is unaligned or beyond
//! [`Offset::MAX_ACTUAL`] cannot be encoded and fails the save.
//!
//! Index files are written to a temporary sibling and renamed over the
//! destination, so an interrupted save never leaves a short index in place.

use crate::error::IndexError;
use crate::needle_map::{IndexEntry, NeedleMap, Offset};
use bytes::{Buf, BufMut, BytesMut};
use needlefix_volume::Size;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Size of one index entry in bytes.
pub const INDEX_ENTRY_SIZE: usize = 16;

const ENTRIES_PER_CHUNK: usize = 1024;

impl IndexEntry {
    /// Appends the on-disk form of this entry to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), IndexError> {
        let offset = Offset::from_actual(self.offset)?;
        buf.put_u64(self.key);
        buf.put_u32(offset.stored());
        buf.put_i32(self.size.as_i32());
        Ok(())
    }

    pub fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < INDEX_ENTRY_SIZE {
            return None;
        }
        Some(Self {
            key: buf.get_u64(),
            offset: Offset::from_stored(buf.get_u32()).to_actual(),
            size: Size(buf.get_i32()),
        })
    }
}

impl NeedleMap {
    /// Writes all live entries to `path`, sorted by key.
    ///
    /// Returns the number of entries written. On failure the existing file
    /// at `path`, if any, is left as it was.
    pub fn save_to_idx(&self, path: &Path, sync: bool) -> Result<u64, IndexError> {
        let mut entries: Vec<IndexEntry> = self.dump().collect();
        entries.sort_unstable_by_key(|e| e.key);
        write_index_file(path, entries, sync)
    }
}

/// Writes `entries` to a new index file at `path`, replacing any existing file.
///
/// Returns the number of entries written. If writing fails, the partially
/// written temporary file is removed before the error is returned.
pub fn write_index_file<I>(path: &Path, entries: I, sync: bool) -> Result<u64, IndexError>
where
    I: IntoIterator<Item = IndexEntry>,
{
    persist_with(path, sync, |writer| write_entries(writer, entries))
}

fn persist_with<F>(path: &Path, sync: bool, write: F) -> Result<u64, IndexError>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<u64, IndexError>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(|source| IndexError::Create {
        path: path.to_path_buf(),
        source,
    })?;

    let count = match write_and_sync(tmp.as_file(), sync, write) {
        Ok(count) => count,
        Err(e) => {
            let tmp_path = tmp.path().to_path_buf();
            if let Err(cleanup) = tmp.close() {
                tracing::warn!(
                    "Failed to remove partial index file {}: {}",
                    tmp_path.display(),
                    cleanup
                );
            }
            return Err(match e {
                IndexError::Io(source) => IndexError::Write {
                    path: path.to_path_buf(),
                    source,
                },
                other => other,
            });
        }
    };

    // A failed rename drops the temporary file, which removes it
    tmp.persist(path).map_err(|e| IndexError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(count)
}

fn write_and_sync<F>(file: &File, sync: bool, write: F) -> Result<u64, IndexError>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<u64, IndexError>,
{
    let mut writer = BufWriter::new(file);
    let count = write(&mut writer)?;
    writer.flush()?;
    drop(writer);
    if sync {
        file.sync_all()?;
    }
    Ok(count)
}

fn write_entries<W, I>(writer: &mut W, entries: I) -> Result<u64, IndexError>
where
    W: Write,
    I: IntoIterator<Item = IndexEntry>,
{
    let mut buf = BytesMut::with_capacity(INDEX_ENTRY_SIZE * ENTRIES_PER_CHUNK);
    let mut count = 0u64;

    for entry in entries {
        entry.encode(&mut buf)?;
        count += 1;
        if buf.len() >= INDEX_ENTRY_SIZE * ENTRIES_PER_CHUNK {
            writer.write_all(&buf)?;
            buf.clear();
        }
    }
    writer.write_all(&buf)?;

    Ok(count)
}

/// Calls `visit` for every entry of the index file at `path`, in file order.
pub fn walk_idx<F>(path: &Path, mut visit: F) -> Result<u64, IndexError>
where
    F: FnMut(IndexEntry),
{
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len % INDEX_ENTRY_SIZE as u64 != 0 {
        return Err(IndexError::Corrupted(format!(
            "{} is {} bytes, not a multiple of {}",
            path.display(),
            len,
            INDEX_ENTRY_SIZE
        )));
    }

    let mut reader = BufReader::new(file);
    let mut chunk = vec![0u8; INDEX_ENTRY_SIZE * ENTRIES_PER_CHUNK];
    let mut remaining = len as usize;
    let mut count = 0u64;

    while remaining > 0 {
        let n = remaining.min(chunk.len());
        reader.read_exact(&mut chunk[..n])?;
        for raw in chunk[..n].chunks_exact(INDEX_ENTRY_SIZE) {
            if let Some(entry) = IndexEntry::decode(raw) {
                visit(entry);
                count += 1;
            }
        }
        remaining -= n;
    }

    Ok(count)
}

/// Reads every entry of the index file at `path`.
pub fn read_idx(path: &Path) -> Result<Vec<IndexEntry>, IndexError> {
    let mut entries = Vec::new();
    walk_idx(path, |entry| entries.push(entry))?;
    Ok(entries)
}

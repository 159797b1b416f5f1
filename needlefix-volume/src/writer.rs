//! Append-only volume writer.

use crate::error::VolumeError;
use crate::needle::{Cookie, Needle, NeedleId};
use crate::superblock::{SuperBlock, Version};
use crate::{volume_file_stem, VolumeId, DATA_FILE_EXTENSION};
use bytes::Bytes;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes a new volume data file.
pub struct VolumeWriter {
    path: PathBuf,
    file: File,
    version: Version,
    size: u64,
}

impl VolumeWriter {
    /// Creates `<dir>/[<collection>_]<volume_id>.dat` and writes its superblock.
    pub fn create(
        dir: &Path,
        collection: &str,
        volume_id: VolumeId,
        super_block: SuperBlock,
    ) -> Result<Self, VolumeError> {
        let path = dir.join(format!(
            "{}.{}",
            volume_file_stem(collection, volume_id),
            DATA_FILE_EXTENSION
        ));
        Self::create_at(path, super_block)
    }

    /// Creates a volume at an explicit path.
    pub fn create_at(path: impl Into<PathBuf>, super_block: SuperBlock) -> Result<Self, VolumeError> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|source| VolumeError::Open {
                path: path.clone(),
                source,
            })?;

        let encoded = super_block.encode()?;
        file.write_all(&encoded)?;

        Ok(Self {
            path,
            file,
            version: super_block.version,
            size: encoded.len() as u64,
        })
    }

    /// Returns the data file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the needle format version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the current file size, which is the offset of the next needle.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends an encoded needle and returns its offset.
    pub fn append(&mut self, needle: &Needle) -> Result<u64, VolumeError> {
        let encoded = needle.encode(self.version)?;
        let offset = self.size;
        self.file.write_all(&encoded)?;
        self.size += encoded.len() as u64;
        Ok(offset)
    }

    /// Appends a live needle stamped with the current time.
    pub fn write_needle(
        &mut self,
        id: NeedleId,
        cookie: Cookie,
        data: Bytes,
    ) -> Result<u64, VolumeError> {
        let mut needle = Needle::new(id, cookie, data)?;
        needle.append_at_ns = now_ns();
        self.append(&needle)
    }

    /// Appends a tombstone for `id`.
    pub fn delete_needle(&mut self, id: NeedleId, cookie: Cookie) -> Result<u64, VolumeError> {
        let mut needle = Needle::tombstone(id, cookie);
        needle.append_at_ns = now_ns();
        self.append(&needle)
    }

    /// Syncs the data file to disk.
    pub fn sync(&mut self) -> Result<(), VolumeError> {
        self.file.sync_data()?;
        Ok(())
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

//! Needle encoding.
//!
//! Each needle has the following on-disk format:
//!
//! ```text
//! +----------+----------+----------+-----------------+----------+--------------+---------+
//! | cookie   | id       | size     | data            | crc32c   | append_at_ns | padding |
//! | 4 bytes  | 8 bytes  | 4 bytes  | max(size,0)     | 4 bytes  | 8 bytes (v3) | to 8    |
//! +----------+----------+----------+-----------------+----------+--------------+---------+
//! ```
//!
//! A deletion is appended as a needle whose size is not valid, normally
//! [`TOMBSTONE_FILE_SIZE`], with an empty data section.

use crate::error::VolumeError;
use crate::superblock::Version;
use crate::{padded_len, NEEDLE_HEADER_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Needle key.
pub type NeedleId = u64;

/// Random value stored with each needle to make ids unguessable.
pub type Cookie = u32;

/// Maximum needle data size (1 GiB).
pub const MAX_NEEDLE_SIZE: usize = 1024 * 1024 * 1024;

/// Size sentinel marking a deleted needle.
pub const TOMBSTONE_FILE_SIZE: Size = Size(-1);

const CHECKSUM_SIZE: u64 = 4;
const TIMESTAMP_SIZE: u64 = 8;

/// Needle data size, or a deletion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Size(pub i32);

impl Size {
    /// Returns true if this size describes a live payload.
    pub fn is_valid(&self) -> bool {
        self.0 > 0 && *self != TOMBSTONE_FILE_SIZE
    }

    /// Returns true if this size marks the needle as deleted.
    pub fn is_deleted(&self) -> bool {
        !self.is_valid()
    }

    /// Number of data bytes stored on disk for this size.
    pub fn data_len(&self) -> u64 {
        self.0.max(0) as u64
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == TOMBSTONE_FILE_SIZE {
            write!(f, "tombstone")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A decoded needle. `data` is empty unless the body was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Needle {
    pub cookie: Cookie,
    pub id: NeedleId,
    pub size: Size,
    pub data: Bytes,
    pub checksum: u32,
    pub append_at_ns: u64,
}

impl Needle {
    /// Creates a live needle carrying `data`.
    pub fn new(id: NeedleId, cookie: Cookie, data: Bytes) -> Result<Self, VolumeError> {
        if data.len() > MAX_NEEDLE_SIZE {
            return Err(VolumeError::NeedleTooLarge {
                size: data.len(),
                max: MAX_NEEDLE_SIZE,
            });
        }
        Ok(Self {
            cookie,
            id,
            size: Size(data.len() as i32),
            checksum: crc32c::crc32c(&data),
            data,
            append_at_ns: 0,
        })
    }

    /// Creates a tombstone for `id`.
    pub fn tombstone(id: NeedleId, cookie: Cookie) -> Self {
        Self {
            cookie,
            id,
            size: TOMBSTONE_FILE_SIZE,
            data: Bytes::new(),
            checksum: crc32c::crc32c(&[]),
            append_at_ns: 0,
        }
    }

    /// Decodes a needle header. The returned needle has no body.
    pub fn parse_header(header: &[u8; NEEDLE_HEADER_SIZE]) -> Self {
        let mut buf = &header[..];
        let cookie = buf.get_u32();
        let id = buf.get_u64();
        let size = Size(buf.get_i32());
        Self {
            cookie,
            id,
            size,
            data: Bytes::new(),
            checksum: 0,
            append_at_ns: 0,
        }
    }

    /// Decodes the body that follows this needle's header and verifies its checksum.
    pub fn read_body(
        &mut self,
        mut body: Bytes,
        version: Version,
        offset: u64,
    ) -> Result<(), VolumeError> {
        let data_len = self.size.data_len() as usize;
        let expected_len = body_len(self.size, version) as usize;
        if body.len() < expected_len {
            return Err(VolumeError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "needle {} body is {} bytes, expected {}",
                    self.id,
                    body.len(),
                    expected_len
                ),
            )));
        }

        let data = body.split_to(data_len);
        let expected = body.get_u32();
        let actual = crc32c::crc32c(&data);
        if expected != actual {
            return Err(VolumeError::ChecksumMismatch {
                id: self.id,
                offset,
                expected,
                actual,
            });
        }

        self.data = data;
        self.checksum = expected;
        if version.has_append_timestamp() {
            self.append_at_ns = body.get_u64();
        }
        Ok(())
    }

    /// Encodes the needle, including trailing padding.
    pub fn encode(&self, version: Version) -> Result<BytesMut, VolumeError> {
        if self.data.len() > MAX_NEEDLE_SIZE {
            return Err(VolumeError::NeedleTooLarge {
                size: self.data.len(),
                max: MAX_NEEDLE_SIZE,
            });
        }

        let total = self.disk_size(version) as usize;
        let mut buf = BytesMut::with_capacity(total);
        buf.put_u32(self.cookie);
        buf.put_u64(self.id);
        buf.put_i32(self.size.as_i32());
        buf.put_slice(&self.data);
        buf.put_u32(self.checksum);
        if version.has_append_timestamp() {
            buf.put_u64(self.append_at_ns);
        }
        buf.resize(total, 0);
        Ok(buf)
    }

    /// Returns the total size of this needle on disk.
    pub fn disk_size(&self, version: Version) -> u64 {
        NEEDLE_HEADER_SIZE as u64 + body_len(self.size, version)
    }
}

/// Bytes following a needle header for a needle of `size`, padding included.
pub fn body_len(size: Size, version: Version) -> u64 {
    let mut len = NEEDLE_HEADER_SIZE as u64 + size.data_len() + CHECKSUM_SIZE;
    if version.has_append_timestamp() {
        len += TIMESTAMP_SIZE;
    }
    padded_len(len) - NEEDLE_HEADER_SIZE as u64
}

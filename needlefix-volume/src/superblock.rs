//! Volume superblock.
//!
//! The superblock is the fixed header at offset 0 of every volume:
//!
//! ```text
//! +----------+-----------+----------+------------+------------+----------------+
//! | version  | replica   | ttl      | compaction | extra_size | extra          |
//! | 1 byte   | 1 byte    | 2 bytes  | 2 bytes    | 2 bytes    | extra_size     |
//! +----------+-----------+----------+------------+------------+----------------+
//! ```
//!
//! The first needle follows at the superblock length rounded up to
//! [`NEEDLE_PADDING_SIZE`](crate::NEEDLE_PADDING_SIZE).

use crate::error::VolumeError;
use crate::padded_len;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Fixed part of the superblock in bytes.
pub const SUPER_BLOCK_SIZE: usize = 8;

/// Needle format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u8);

impl Version {
    pub const V1: Version = Version(1);
    pub const V2: Version = Version(2);
    pub const V3: Version = Version(3);

    /// Version written by [`VolumeWriter`](crate::VolumeWriter) by default.
    pub const CURRENT: Version = Version::V3;

    pub fn new(value: u8) -> Result<Self, VolumeError> {
        match value {
            1..=3 => Ok(Self(value)),
            _ => Err(VolumeError::UnsupportedVersion(value)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Version 3 needles carry an 8-byte append timestamp after the checksum.
    pub fn has_append_timestamp(&self) -> bool {
        self.0 >= 3
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Decoded volume superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub version: Version,
    pub replica_placement: u8,
    pub ttl: u16,
    pub compaction_revision: u16,
    pub extra: Bytes,
}

impl SuperBlock {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            replica_placement: 0,
            ttl: 0,
            compaction_revision: 0,
            extra: Bytes::new(),
        }
    }

    /// Encodes the superblock, including alignment padding.
    pub fn encode(&self) -> Result<BytesMut, VolumeError> {
        if self.extra.len() > u16::MAX as usize {
            return Err(VolumeError::InvalidSuperBlock(format!(
                "extra section too large: {} bytes",
                self.extra.len()
            )));
        }

        let mut buf = BytesMut::with_capacity(self.disk_size() as usize);
        buf.put_u8(self.version.as_u8());
        buf.put_u8(self.replica_placement);
        buf.put_u16(self.ttl);
        buf.put_u16(self.compaction_revision);
        buf.put_u16(self.extra.len() as u16);
        buf.put_slice(&self.extra);
        buf.resize(self.disk_size() as usize, 0);
        Ok(buf)
    }

    /// Decodes the fixed part of a superblock.
    ///
    /// Returns the superblock with an empty `extra` and the number of extra
    /// bytes that follow it.
    pub fn decode_fixed(mut buf: &[u8]) -> Result<(Self, u16), VolumeError> {
        if buf.len() < SUPER_BLOCK_SIZE {
            return Err(VolumeError::InvalidSuperBlock(format!(
                "expected {} bytes, got {}",
                SUPER_BLOCK_SIZE,
                buf.len()
            )));
        }

        let version = Version::new(buf.get_u8())?;
        let replica_placement = buf.get_u8();
        let ttl = buf.get_u16();
        let compaction_revision = buf.get_u16();
        let extra_size = buf.get_u16();

        Ok((
            Self {
                version,
                replica_placement,
                ttl,
                compaction_revision,
                extra: Bytes::new(),
            },
            extra_size,
        ))
    }

    /// Returns the offset of the first needle.
    pub fn disk_size(&self) -> u64 {
        padded_len((SUPER_BLOCK_SIZE + self.extra.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_validation() {
        assert_eq!(Version::new(1).unwrap(), Version::V1);
        assert_eq!(Version::new(3).unwrap(), Version::V3);
        assert!(matches!(
            Version::new(0),
            Err(VolumeError::UnsupportedVersion(0))
        ));
        assert!(matches!(
            Version::new(9),
            Err(VolumeError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_superblock_encode_decode() {
        let mut sb = SuperBlock::new(Version::V2);
        sb.replica_placement = 1;
        sb.ttl = 300;
        sb.compaction_revision = 4;

        let encoded = sb.encode().unwrap();
        assert_eq!(encoded.len(), SUPER_BLOCK_SIZE);

        let (decoded, extra_size) = SuperBlock::decode_fixed(&encoded).unwrap();
        assert_eq!(extra_size, 0);
        assert_eq!(decoded, sb);
    }

    #[test]
    fn test_superblock_extra_is_padded() {
        let mut sb = SuperBlock::new(Version::V3);
        sb.extra = Bytes::from_static(b"abc");

        let encoded = sb.encode().unwrap();
        assert_eq!(encoded.len(), 16);
        assert_eq!(sb.disk_size(), 16);

        let (_, extra_size) = SuperBlock::decode_fixed(&encoded).unwrap();
        assert_eq!(extra_size, 3);
        assert_eq!(&encoded[8..11], b"abc");
    }

    #[test]
    fn test_superblock_too_short() {
        let result = SuperBlock::decode_fixed(&[3, 0, 0]);
        assert!(matches!(result, Err(VolumeError::InvalidSuperBlock(_))));
    }
}

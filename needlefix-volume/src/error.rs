//! Volume error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or appending to a volume.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open volume file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid superblock: {0}")]
    InvalidSuperBlock(String),

    #[error("unsupported volume version {0}")]
    UnsupportedVersion(u8),

    #[error("needle {id} at offset {offset} corrupted: CRC mismatch (expected {expected:#x}, got {actual:#x})")]
    ChecksumMismatch {
        id: u64,
        offset: u64,
        expected: u32,
        actual: u32,
    },

    #[error("needle too large: {size} bytes (max {max})")]
    NeedleTooLarge { size: usize, max: usize },

    #[error("scan aborted at offset {offset}: {source}")]
    VisitorAborted {
        offset: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl VolumeError {
    /// Returns whether the log itself is damaged, as opposed to an environment failure.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            VolumeError::InvalidSuperBlock(_)
                | VolumeError::UnsupportedVersion(_)
                | VolumeError::ChecksumMismatch { .. }
        )
    }
}

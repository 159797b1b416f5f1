//! Core error types.

use needlefix_index::IndexError;
use needlefix_volume::VolumeError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reasons a path is not a volume data file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VolumeNameError {
    #[error("path is not valid UTF-8")]
    NonUtf8Path,

    #[error("path has no file name")]
    MissingFileName,

    #[error("file name has no extension")]
    MissingExtension,

    #[error("file name does not end in a volume id")]
    MissingVolumeId,

    #[error("volume id {0} is out of range")]
    VolumeIdOutOfRange(String),

    #[error("volume id {0} has leading zeros")]
    NonCanonicalVolumeId(String),

    #[error("extension is {found:?}, expected {expected:?}")]
    ExtensionMismatch { found: String, expected: String },
}

/// Errors raised by the replay visitor.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("needle at offset {0} arrived before the superblock")]
    NeedleBeforeSuperBlock(u64),

    #[error("superblock visited twice")]
    DuplicateSuperBlock,
}

/// Failure rebuilding one volume's index.
#[derive(Debug, Error)]
pub enum FixError {
    #[error("scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: VolumeError,
    },

    #[error("save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: IndexError,
    },
}

impl FixError {
    /// Path of the file the failure refers to.
    pub fn path(&self) -> &Path {
        match self {
            FixError::Scan { path, .. } | FixError::Save { path, .. } => path,
        }
    }
}

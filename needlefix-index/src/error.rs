//! Index error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the needle map and index files.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot create index file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing index file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot move index file into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("needle offset {0} exceeds the addressable index range")]
    OffsetOutOfRange(u64),

    #[error("needle offset {0} is not aligned to the needle padding")]
    UnalignedOffset(u64),

    #[error("index file corrupted: {0}")]
    Corrupted(String),
}

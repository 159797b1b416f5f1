//! # needlefix-index
//!
//! Needle index structures for needlefix.
//!
//! This crate provides:
//! - An in-memory needle map with last-write-wins and tombstone semantics
//! - The `.idx` index file format (writer and reader)

pub mod error;
pub mod idx;
pub mod needle_map;

pub use error::IndexError;
pub use idx::{read_idx, walk_idx, write_index_file, INDEX_ENTRY_SIZE};
pub use needle_map::{IndexEntry, NeedleMap, Offset};

/// Index file extension.
pub const INDEX_FILE_EXTENSION: &str = "idx";

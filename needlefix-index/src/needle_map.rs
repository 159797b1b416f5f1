//! In-memory needle map.
//!
//! Maps a needle id to the location and size of its most recent live copy.
//! Replaying a volume in append order through [`NeedleMap::set`] and
//! [`NeedleMap::delete`] leaves exactly the needles that are still live.

use crate::error::IndexError;
use needlefix_volume::{NeedleId, Size, NEEDLE_PADDING_SIZE};
use std::collections::HashMap;
use std::fmt;

/// Needle offset as stored in an index file, in units of [`NEEDLE_PADDING_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Offset(u32);

impl Offset {
    /// Largest byte offset an index entry can address.
    pub const MAX_ACTUAL: u64 = u32::MAX as u64 * NEEDLE_PADDING_SIZE;

    /// Converts a byte offset in the data file.
    pub fn from_actual(offset: u64) -> Result<Self, IndexError> {
        if offset % NEEDLE_PADDING_SIZE != 0 {
            return Err(IndexError::UnalignedOffset(offset));
        }
        if offset > Self::MAX_ACTUAL {
            return Err(IndexError::OffsetOutOfRange(offset));
        }
        Ok(Self((offset / NEEDLE_PADDING_SIZE) as u32))
    }

    pub fn from_stored(value: u32) -> Self {
        Self(value)
    }

    /// Byte offset in the data file.
    pub fn to_actual(&self) -> u64 {
        self.0 as u64 * NEEDLE_PADDING_SIZE
    }

    pub fn stored(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_actual())
    }
}

/// A live needle in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: NeedleId,
    /// Byte offset of the needle in the data file.
    pub offset: u64,
    pub size: Size,
}

/// Needle map for a single volume.
#[derive(Debug, Default)]
pub struct NeedleMap {
    entries: HashMap<NeedleId, (u64, Size)>,
}

impl NeedleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` as live at byte `offset` with `size`, replacing any
    /// earlier entry.
    pub fn set(&mut self, key: NeedleId, offset: u64, size: Size) {
        self.entries.insert(key, (offset, size));
    }

    /// Removes `key`. Returns whether it was present; deleting an unknown
    /// key is not an error.
    pub fn delete(&mut self, key: NeedleId) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Looks up the live entry for `key`.
    pub fn get(&self, key: NeedleId) -> Option<IndexEntry> {
        self.entries
            .get(&key)
            .map(|&(offset, size)| IndexEntry { key, offset, size })
    }

    pub fn contains(&self, key: NeedleId) -> bool {
        self.entries.contains_key(&key)
    }

    /// Returns the number of live needles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all live entries in unspecified order.
    pub fn dump(&self) -> impl Iterator<Item = IndexEntry> + '_ {
        self.entries
            .iter()
            .map(|(&key, &(offset, size))| IndexEntry { key, offset, size })
    }

    /// Total data bytes of all live needles.
    pub fn live_bytes(&self) -> u64 {
        self.entries.values().map(|(_, size)| size.data_len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_offset_conversion() {
        assert_eq!(Offset::from_actual(0).unwrap().stored(), 0);
        assert_eq!(Offset::from_actual(64).unwrap().stored(), 8);
        assert_eq!(Offset::from_actual(64).unwrap().to_actual(), 64);
        assert!(matches!(
            Offset::from_actual(12),
            Err(IndexError::UnalignedOffset(12))
        ));
        assert!(matches!(
            Offset::from_actual(Offset::MAX_ACTUAL + 8),
            Err(IndexError::OffsetOutOfRange(_))
        ));
        assert!(Offset::from_actual(Offset::MAX_ACTUAL).is_ok());
    }

    #[test]
    fn test_set_overwrites() {
        let mut map = NeedleMap::new();
        map.set(1, 8, Size(10));
        map.set(1, 64, Size(3));

        let entry = map.get(1).unwrap();
        assert_eq!(entry.offset, 64);
        assert_eq!(entry.size, Size(3));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_delete_after_set() {
        let mut map = NeedleMap::new();
        map.set(5, 8, Size(10));
        assert!(map.delete(5));
        assert!(map.get(5).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut map = NeedleMap::new();
        map.set(1, 8, Size(10));
        assert!(!map.delete(2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_set_accepts_any_byte_offset() {
        let mut map = NeedleMap::new();
        map.set(1, 8, Size(10));
        map.set(1, 13, Size(4));
        map.set(2, Offset::MAX_ACTUAL + 1, Size(1));

        assert_eq!(map.get(1).unwrap().offset, 13);
        assert_eq!(map.get(2).unwrap().offset, Offset::MAX_ACTUAL + 1);
    }

    #[test]
    fn test_dump_is_exhaustive() {
        let mut map = NeedleMap::new();
        for key in 0..100u64 {
            map.set(key, key * 8, Size(key as i32 + 1));
        }
        for key in (0..100u64).step_by(2) {
            map.delete(key);
        }

        let mut keys: Vec<u64> = map.dump().map(|e| e.key).collect();
        keys.sort_unstable();
        let expected: Vec<u64> = (1..100u64).step_by(2).collect();
        assert_eq!(keys, expected);
        assert_eq!(map.live_bytes(), expected.iter().map(|k| k + 1).sum::<u64>());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(u64, u64, i32),
        Delete(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..16, 0u64..1_000_000, 1i32..4096).prop_map(|(k, o, s)| Op::Set(k, o, s)),
            (0u64..16).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn prop_last_write_wins(ops in prop::collection::vec(op_strategy(), 0..200)) {
            let mut map = NeedleMap::new();
            let mut last: HashMap<u64, Option<(u64, i32)>> = HashMap::new();

            for op in &ops {
                match *op {
                    Op::Set(key, offset, size) => {
                        map.set(key, offset, Size(size));
                        last.insert(key, Some((offset, size)));
                    }
                    Op::Delete(key) => {
                        map.delete(key);
                        last.insert(key, None);
                    }
                }
            }

            for (key, state) in &last {
                match state {
                    Some((offset, size)) => {
                        let entry = map.get(*key).unwrap();
                        prop_assert_eq!(entry.offset, *offset);
                        prop_assert_eq!(entry.size, Size(*size));
                    }
                    None => prop_assert!(map.get(*key).is_none()),
                }
            }
            let live = last.values().filter(|s| s.is_some()).count();
            prop_assert_eq!(map.len(), live);
        }

        #[test]
        fn prop_delete_unknown_keeps_size(keys in prop::collection::vec(0u64..1000, 0..50)) {
            let mut map = NeedleMap::new();
            for key in &keys {
                map.set(*key, 0, Size(1));
            }
            let before = map.len();
            prop_assert!(!map.delete(5000));
            prop_assert_eq!(map.len(), before);
        }
    }
}

//! Replay visitor that rebuilds a needle map from a volume scan.

use crate::error::ReplayError;
use needlefix_index::NeedleMap;
use needlefix_volume::{Needle, SuperBlock, Version, VisitResult, VolumeFileScanner};
use serde::Serialize;

/// Counters collected while replaying a volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Needles visited.
    pub needles: u64,
    /// Needles recorded as live.
    pub sets: u64,
    /// Tombstones and other invalid sizes applied as deletions.
    pub deletes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayState {
    AwaitingSuperBlock,
    Replaying { version: Version },
}

/// Applies each needle of a volume to a [`NeedleMap`] in log order.
///
/// Live needles overwrite any earlier entry for their id; deletions remove
/// it. Needle bodies are never read.
pub struct FixScanner<'a> {
    map: &'a mut NeedleMap,
    state: ReplayState,
    stats: ReplayStats,
}

impl<'a> FixScanner<'a> {
    pub fn new(map: &'a mut NeedleMap) -> Self {
        Self {
            map,
            state: ReplayState::AwaitingSuperBlock,
            stats: ReplayStats::default(),
        }
    }

    /// Version recorded from the superblock, once seen.
    pub fn version(&self) -> Option<Version> {
        match self.state {
            ReplayState::AwaitingSuperBlock => None,
            ReplayState::Replaying { version } => Some(version),
        }
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }
}

impl VolumeFileScanner for FixScanner<'_> {
    fn visit_super_block(&mut self, super_block: &SuperBlock) -> VisitResult {
        if let ReplayState::Replaying { .. } = self.state {
            return Err(ReplayError::DuplicateSuperBlock.into());
        }
        self.state = ReplayState::Replaying {
            version: super_block.version,
        };
        Ok(())
    }

    fn read_needle_body(&self) -> bool {
        false
    }

    fn visit_needle(&mut self, needle: &Needle, offset: u64) -> VisitResult {
        let ReplayState::Replaying { version } = self.state else {
            return Err(ReplayError::NeedleBeforeSuperBlock(offset).into());
        };

        tracing::trace!(
            "key {} offset {} size {} disk_size {}",
            needle.id,
            offset,
            needle.size,
            needle.disk_size(version)
        );

        self.stats.needles += 1;
        if needle.size.is_valid() {
            self.map.set(needle.id, offset, needle.size);
            self.stats.sets += 1;
        } else {
            tracing::trace!("deleting key {}", needle.id);
            self.map.delete(needle.id);
            self.stats.deletes += 1;
        }

        Ok(())
    }
}

//! Batch index reconstruction.
//!
//! Each path is handled independently: missing files and names that are not
//! volume data files are skipped, scan and save failures are recorded and the
//! batch moves on unless `fail_fast` is set.

use crate::config::FixConfig;
use crate::error::{FixError, VolumeNameError};
use crate::fix_scanner::{FixScanner, ReplayStats};
use crate::volume_name::VolumeFileName;
use needlefix_index::{NeedleMap, INDEX_FILE_EXTENSION};
use needlefix_volume::{scan_volume_file, DATA_FILE_EXTENSION};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a path was not processed.
#[derive(Debug)]
pub enum SkipReason {
    /// The path does not exist.
    NotFound,
    /// The path is not named like a volume data file.
    InvalidName(VolumeNameError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "file does not exist"),
            SkipReason::InvalidName(e) => write!(f, "not a volume data file: {}", e),
        }
    }
}

/// Details of a successfully rebuilt index.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildSummary {
    pub index_path: PathBuf,
    /// Entries written to the index file.
    pub live_needles: u64,
    /// Sum of the data sizes of the live entries.
    pub live_bytes: u64,
    pub replay: ReplayStats,
    /// Bytes of an incomplete trailing needle ignored by the scan.
    pub truncated_bytes: u64,
}

/// Result of processing one path.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VolumeOutcome {
    Rebuilt {
        path: PathBuf,
        #[serde(flatten)]
        summary: RebuildSummary,
    },
    Skipped {
        path: PathBuf,
        #[serde(serialize_with = "serialize_display")]
        reason: SkipReason,
    },
    Failed {
        path: PathBuf,
        #[serde(serialize_with = "serialize_display")]
        error: FixError,
    },
    /// Not processed because an earlier volume failed under `fail_fast`.
    NotAttempted { path: PathBuf },
}

impl VolumeOutcome {
    /// Input path this outcome refers to.
    pub fn path(&self) -> &Path {
        match self {
            VolumeOutcome::Rebuilt { path, .. }
            | VolumeOutcome::Skipped { path, .. }
            | VolumeOutcome::Failed { path, .. }
            | VolumeOutcome::NotAttempted { path } => path,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, VolumeOutcome::Failed { .. })
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Aggregate result of a batch run.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<VolumeOutcome>,
    /// Whether the batch stopped early under `fail_fast`.
    pub aborted: bool,
}

impl BatchReport {
    pub fn rebuilt(&self) -> usize {
        self.count(|o| matches!(o, VolumeOutcome::Rebuilt { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, VolumeOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(VolumeOutcome::is_failure)
    }

    pub fn not_attempted(&self) -> usize {
        self.count(|o| matches!(o, VolumeOutcome::NotAttempted { .. }))
    }

    /// Returns true if any volume failed to rebuild.
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(VolumeOutcome::is_failure)
    }

    /// Input paths of the volumes that failed.
    pub fn failed_paths(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(VolumeOutcome::path)
            .collect()
    }

    fn count(&self, pred: impl Fn(&VolumeOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Rebuilds index files for volume data files.
pub struct Fixer {
    config: FixConfig,
}

impl Fixer {
    pub fn new(config: FixConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FixConfig {
        &self.config
    }

    /// Processes every path in order and collects the outcomes.
    pub fn run<P: AsRef<Path>>(&self, paths: &[P]) -> BatchReport {
        let mut report = BatchReport::default();

        for (i, path) in paths.iter().enumerate() {
            let outcome = self.fix_volume(path.as_ref());
            let failed = outcome.is_failure();
            report.outcomes.push(outcome);

            if failed && self.config.fail_fast {
                report.aborted = true;
                report.outcomes.extend(paths[i + 1..].iter().map(|p| {
                    VolumeOutcome::NotAttempted {
                        path: p.as_ref().to_path_buf(),
                    }
                }));
                tracing::error!(
                    "Stopping after failure; {} volume(s) not attempted",
                    paths.len() - i - 1
                );
                break;
            }
        }

        report
    }

    /// Rebuilds the index for a single data file path.
    pub fn fix_volume(&self, path: &Path) -> VolumeOutcome {
        if let Err(e) = std::fs::metadata(path) {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::warn!("Skipping nonexistent file: {}", path.display());
                return VolumeOutcome::Skipped {
                    path: path.to_path_buf(),
                    reason: SkipReason::NotFound,
                };
            }
        }

        let name = match VolumeFileName::from_path(path, DATA_FILE_EXTENSION) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                return VolumeOutcome::Skipped {
                    path: path.to_path_buf(),
                    reason: SkipReason::InvalidName(e),
                };
            }
        };
        tracing::debug!("Parsed {} as {:?}", path.display(), name);

        match self.rebuild(&name) {
            Ok(summary) => VolumeOutcome::Rebuilt {
                path: path.to_path_buf(),
                summary,
            },
            Err(error) => {
                match &error {
                    FixError::Scan { source, .. } if source.is_corruption() => tracing::error!(
                        "Volume {} is corrupted, index not rebuilt: {}",
                        path.display(),
                        error
                    ),
                    _ => tracing::error!(
                        "Failed to rebuild index for {}: {}",
                        path.display(),
                        error
                    ),
                }
                VolumeOutcome::Failed {
                    path: path.to_path_buf(),
                    error,
                }
            }
        }
    }

    /// Replays the volume into a fresh needle map and saves it. The map is
    /// dropped on return, whether or not the rebuild succeeded.
    fn rebuild(&self, name: &VolumeFileName) -> Result<RebuildSummary, FixError> {
        let dir = name.resolved_dir();
        let data_path = name.sibling(DATA_FILE_EXTENSION);
        let index_path = name.sibling(INDEX_FILE_EXTENSION);

        let mut map = NeedleMap::new();
        let mut scanner = FixScanner::new(&mut map);
        let summary = scan_volume_file(&dir, &name.collection, name.volume_id, &mut scanner)
            .map_err(|source| FixError::Scan {
                path: data_path.clone(),
                source,
            })?;
        let replay = scanner.stats();
        let live_bytes = map.live_bytes();

        let live_needles = map
            .save_to_idx(&index_path, self.config.fsync)
            .map_err(|source| FixError::Save {
                path: index_path.clone(),
                source,
            })?;

        tracing::info!(
            "Rebuilt {} from {}: {} live needles ({} needles, {} deletions, {})",
            index_path.display(),
            data_path.display(),
            live_needles,
            replay.needles,
            replay.deletes,
            summary.version
        );

        Ok(RebuildSummary {
            index_path,
            live_needles,
            live_bytes,
            replay,
            truncated_bytes: summary.truncated_bytes,
        })
    }
}

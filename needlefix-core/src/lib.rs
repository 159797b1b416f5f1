//! # needlefix-core
//!
//! Index reconstruction for needlefix.
//!
//! This crate provides:
//! - Volume file name parsing (`[<dir>/][<collection>_]<id>.dat`)
//! - The replay visitor that rebuilds a needle map from a volume scan
//! - The batch driver that rebuilds `.idx` files for a list of volumes

pub mod config;
pub mod error;
pub mod fix_scanner;
pub mod fixer;
pub mod volume_name;

pub use config::{ConfigError, FixConfig, CONFIG_ENV};
pub use error::{FixError, ReplayError, VolumeNameError};
pub use fix_scanner::{FixScanner, ReplayStats};
pub use fixer::{BatchReport, Fixer, RebuildSummary, SkipReason, VolumeOutcome};
pub use volume_name::VolumeFileName;

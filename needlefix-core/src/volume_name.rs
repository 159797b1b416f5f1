//! Volume file name parsing.
//!
//! Volume data files follow `[<dir>/][<collection>_]<volume_id>.<extension>`:
//! - `<dir>` is everything before the last path separator
//! - `<volume_id>` is the run of decimal digits ending the stem
//! - `<collection>` is the non-empty text before the `_` preceding the digits
//! - `<extension>` is everything after the `.` that follows the digits

use crate::error::VolumeNameError;
use needlefix_volume::{volume_file_stem, VolumeId};
use std::path::{is_separator, Path, PathBuf};

/// Identity of a volume derived from its data file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeFileName {
    /// Directory as written in the path; empty for a bare file name.
    pub dir: PathBuf,
    /// Collection name; empty when the volume has none.
    pub collection: String,
    pub volume_id: VolumeId,
    pub extension: String,
}

impl VolumeFileName {
    /// Parses a volume file path without checking its extension.
    pub fn parse(path: &str) -> Result<Self, VolumeNameError> {
        let (dir, base) = match path.rfind(is_separator) {
            Some(pos) => (&path[..pos + 1], &path[pos + 1..]),
            None => ("", path),
        };
        if base.is_empty() {
            return Err(VolumeNameError::MissingFileName);
        }
        if !base.contains('.') {
            return Err(VolumeNameError::MissingExtension);
        }

        for (pos, _) in base.match_indices('.') {
            let (stem, extension) = (&base[..pos], &base[pos + 1..]);
            if extension.is_empty() {
                continue;
            }
            let Some((collection, digits)) = split_stem(stem) else {
                continue;
            };

            if digits.len() > 1 && digits.starts_with('0') {
                return Err(VolumeNameError::NonCanonicalVolumeId(digits.to_string()));
            }
            let volume_id = digits
                .parse::<VolumeId>()
                .map_err(|_| VolumeNameError::VolumeIdOutOfRange(digits.to_string()))?;

            return Ok(Self {
                dir: PathBuf::from(dir),
                collection: collection.to_string(),
                volume_id,
                extension: extension.to_string(),
            });
        }

        Err(VolumeNameError::MissingVolumeId)
    }

    /// Parses a path that must name a data file with `extension`.
    pub fn parse_data_file(path: &str, extension: &str) -> Result<Self, VolumeNameError> {
        let name = Self::parse(path)?;
        if name.extension != extension {
            return Err(VolumeNameError::ExtensionMismatch {
                found: name.extension,
                expected: extension.to_string(),
            });
        }
        Ok(name)
    }

    /// Parses a filesystem path; non UTF-8 paths are rejected.
    pub fn from_path(path: &Path, extension: &str) -> Result<Self, VolumeNameError> {
        let path = path.to_str().ok_or(VolumeNameError::NonUtf8Path)?;
        Self::parse_data_file(path, extension)
    }

    /// File name without extension: `[<collection>_]<volume_id>`.
    pub fn stem(&self) -> String {
        volume_file_stem(&self.collection, self.volume_id)
    }

    /// Directory with `~` expanded and an empty directory mapped to `.`.
    pub fn resolved_dir(&self) -> PathBuf {
        resolve_path(&self.dir)
    }

    /// Path of a sibling file with the same stem and `extension`.
    pub fn sibling(&self, extension: &str) -> PathBuf {
        self.resolved_dir()
            .join(format!("{}.{}", self.stem(), extension))
    }
}

/// Splits a stem into `(collection, digits)`.
fn split_stem(stem: &str) -> Option<(&str, &str)> {
    let prefix_len = stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (prefix, digits) = stem.split_at(prefix_len);
    if digits.is_empty() {
        return None;
    }
    if prefix.is_empty() {
        return Some(("", digits));
    }
    match prefix.strip_suffix('_') {
        Some(collection) if !collection.is_empty() => Some((collection, digits)),
        _ => None,
    }
}

/// Expands a leading `~` to the home directory and maps an empty path to `.`.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        return PathBuf::from(".");
    }
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_collection() {
        let name = VolumeFileName::parse("mycoll_7.dat").unwrap();
        assert_eq!(name.dir, PathBuf::new());
        assert_eq!(name.collection, "mycoll");
        assert_eq!(name.volume_id, 7);
        assert_eq!(name.extension, "dat");
        assert_eq!(name.stem(), "mycoll_7");
    }

    #[test]
    fn test_parse_without_collection() {
        let name = VolumeFileName::parse("7.dat").unwrap();
        assert_eq!(name.collection, "");
        assert_eq!(name.volume_id, 7);
        assert_eq!(name.extension, "dat");
        assert_eq!(name.stem(), "7");
    }

    #[test]
    fn test_parse_directories() {
        let name = VolumeFileName::parse("/path/to/data_1.dat").unwrap();
        assert_eq!(name.dir, PathBuf::from("/path/to/"));
        assert_eq!(name.collection, "data");
        assert_eq!(name.volume_id, 1);

        let name = VolumeFileName::parse("./collection_24.dat").unwrap();
        assert_eq!(name.dir, PathBuf::from("./"));
        assert_eq!(name.collection, "collection");
        assert_eq!(name.volume_id, 24);

        let name = VolumeFileName::parse("/1.dat").unwrap();
        assert_eq!(name.dir, PathBuf::from("/"));
        assert_eq!(name.volume_id, 1);

        let name = VolumeFileName::parse("relative/dir/42.dat").unwrap();
        assert_eq!(name.dir, PathBuf::from("relative/dir/"));
        assert_eq!(name.collection, "");
        assert_eq!(name.volume_id, 42);
    }

    #[test]
    fn test_collection_takes_everything_before_last_underscore() {
        let name = VolumeFileName::parse("a_b_12.dat").unwrap();
        assert_eq!(name.collection, "a_b");
        assert_eq!(name.volume_id, 12);

        let name = VolumeFileName::parse("my.coll_3.dat").unwrap();
        assert_eq!(name.collection, "my.coll");
        assert_eq!(name.extension, "dat");
    }

    #[test]
    fn test_extension_is_everything_after_the_digits() {
        let name = VolumeFileName::parse("5.dat.bak").unwrap();
        assert_eq!(name.volume_id, 5);
        assert_eq!(name.extension, "dat.bak");
    }

    #[test]
    fn test_rejects_missing_volume_id() {
        assert_eq!(
            VolumeFileName::parse("abc.dat"),
            Err(VolumeNameError::MissingVolumeId)
        );
        assert_eq!(
            VolumeFileName::parse("x7.dat"),
            Err(VolumeNameError::MissingVolumeId)
        );
        assert_eq!(
            VolumeFileName::parse("_7.dat"),
            Err(VolumeNameError::MissingVolumeId)
        );
        assert_eq!(
            VolumeFileName::parse("coll_.dat"),
            Err(VolumeNameError::MissingVolumeId)
        );
    }

    #[test]
    fn test_rejects_missing_parts() {
        assert_eq!(
            VolumeFileName::parse("/data/"),
            Err(VolumeNameError::MissingFileName)
        );
        assert_eq!(
            VolumeFileName::parse("7"),
            Err(VolumeNameError::MissingExtension)
        );
        assert_eq!(
            VolumeFileName::parse("7."),
            Err(VolumeNameError::MissingVolumeId)
        );
    }

    #[test]
    fn test_rejects_bad_volume_ids() {
        assert_eq!(
            VolumeFileName::parse("99999999999.dat"),
            Err(VolumeNameError::VolumeIdOutOfRange("99999999999".to_string()))
        );
        assert_eq!(
            VolumeFileName::parse("c_007.dat"),
            Err(VolumeNameError::NonCanonicalVolumeId("007".to_string()))
        );
        assert_eq!(VolumeFileName::parse("0.dat").unwrap().volume_id, 0);
    }

    #[test]
    fn test_parse_data_file_checks_extension() {
        assert!(VolumeFileName::parse_data_file("7.dat", "dat").is_ok());
        assert_eq!(
            VolumeFileName::parse_data_file("7.idx", "dat"),
            Err(VolumeNameError::ExtensionMismatch {
                found: "idx".to_string(),
                expected: "dat".to_string(),
            })
        );
    }

    #[test]
    fn test_sibling_path() {
        let name = VolumeFileName::parse("/srv/vol/pics_3.dat").unwrap();
        assert_eq!(name.sibling("idx"), PathBuf::from("/srv/vol/pics_3.idx"));

        let name = VolumeFileName::parse("3.dat").unwrap();
        assert_eq!(name.sibling("idx"), PathBuf::from("./3.idx"));
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path(Path::new("")), PathBuf::from("."));
        assert_eq!(resolve_path(Path::new("/a/b")), PathBuf::from("/a/b"));
        if let Some(home) = home::home_dir() {
            assert_eq!(resolve_path(Path::new("~/vols")), home.join("vols"));
        }
    }
}

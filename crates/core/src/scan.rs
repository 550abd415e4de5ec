//! Source directory listing and candidate filtering

use crate::config::{Config, ExtensionPolicy};
use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A directory entry that may be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Base name, used as the last key segment
    pub file_name: String,
    /// Lowercase extension with leading dot, empty when there is none
    pub extension: String,
    /// Size in bytes
    pub size: u64,
}

/// Why an entry was not selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooSmall { size: u64, min: u64 },
    ExtensionExcluded(String),
    NotAFile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooSmall { size, min } => {
                write!(f, "smaller than minimum ({} < {} bytes)", size, min)
            }
            SkipReason::ExtensionExcluded(ext) if ext.is_empty() => {
                write!(f, "no extension")
            }
            SkipReason::ExtensionExcluded(ext) => write!(f, "extension {} excluded", ext),
            SkipReason::NotAFile => write!(f, "not a regular file"),
        }
    }
}

/// An entry left on disk untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Outcome of scanning every source directory
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub selected: Vec<CandidateFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Size and extension predicate
#[derive(Debug, Clone)]
pub struct FileFilter {
    min_file_size: u64,
    policy: ExtensionPolicy,
    extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(min_file_size: u64, policy: ExtensionPolicy, extensions: Vec<String>) -> Self {
        Self {
            min_file_size,
            policy,
            extensions,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.min_file_size,
            config.extension_policy,
            config.extension_set(),
        )
    }

    /// `Ok(())` when the file should be uploaded
    pub fn check(&self, file: &CandidateFile) -> std::result::Result<(), SkipReason> {
        if file.size < self.min_file_size {
            return Err(SkipReason::TooSmall {
                size: file.size,
                min: self.min_file_size,
            });
        }

        if !self.extension_allowed(&file.extension) {
            return Err(SkipReason::ExtensionExcluded(file.extension.clone()));
        }

        Ok(())
    }

    fn extension_allowed(&self, extension: &str) -> bool {
        let listed = self.extensions.iter().any(|e| e == extension);
        match self.policy {
            ExtensionPolicy::DenyList => !listed,
            ExtensionPolicy::AllowList => listed,
        }
    }
}

fn candidate_from_path(path: &Path, size: u64) -> CandidateFile {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    CandidateFile {
        path: path.to_path_buf(),
        file_name,
        extension,
        size,
    }
}

/// Scan one directory (immediate entries only), in file-name order
pub fn scan_directory(dir: &Path, filter: &FileFilter, result: &mut ScanResult) -> Result<()> {
    let listing_error = |source: std::io::Error| Error::Listing {
        path: dir.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(dir).map_err(listing_error)?;
    if !metadata.is_dir() {
        return Err(listing_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| listing_error(std::io::Error::from(e)))?;
        let path = entry.path();

        // Follows symlinks, so a link to an image is treated like the image.
        let metadata = std::fs::metadata(path).map_err(listing_error)?;
        if !metadata.is_file() {
            debug!(path = %path.display(), "skipping non-file entry");
            result.skipped.push(SkippedFile {
                path: path.to_path_buf(),
                reason: SkipReason::NotAFile,
            });
            continue;
        }

        let candidate = candidate_from_path(path, metadata.len());
        match filter.check(&candidate) {
            Ok(()) => result.selected.push(candidate),
            Err(reason) => {
                debug!(file = %candidate.file_name, %reason, "skipping");
                result.skipped.push(SkippedFile {
                    path: candidate.path,
                    reason,
                });
            }
        }
    }

    Ok(())
}

/// Scan every configured source directory, resolved against `root`
///
/// The first listing error aborts the whole scan.
pub fn scan_directories(root: &Path, directories: &[String], filter: &FileFilter) -> Result<ScanResult> {
    let mut result = ScanResult::default();
    for directory in directories {
        let dir = root.join(directory);
        scan_directory(&dir, filter, &mut result)?;
    }
    Ok(result)
}

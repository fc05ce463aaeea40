//! Directory enumeration using walkdir

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};

/// Options for directory scanning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Follow symbolic links
    pub follow_links: bool,
}

/// One file or directory found below a scan root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the scan root
    pub relative_path: PathBuf,
    /// Whether this is a directory
    pub is_dir: bool,
    /// File size in bytes (0 for directories)
    pub size: u64,
}

impl FileEntry {
    pub fn file(relative_path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_dir: false,
            size,
        }
    }

    pub fn dir(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_dir: true,
            size: 0,
        }
    }
}

/// Recursive scanner returning every entry below a root, hidden ones included
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    options: ScanOptions,
}

impl DirectoryScanner {
    /// Create a new directory scanner with options
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Scan a directory and return its entries, excluding the root itself
    pub async fn scan<P: AsRef<Path>>(&self, root_path: P) -> Result<Vec<FileEntry>> {
        let root_path = root_path.as_ref().to_path_buf();

        if !root_path.exists() {
            return Err(SyncError::path_error(&root_path, "Directory does not exist"));
        }

        if !root_path.is_dir() {
            return Err(SyncError::path_error(&root_path, "Path is not a directory"));
        }

        let follow_links = self.options.follow_links;
        tokio::task::spawn_blocking(move || walk(&root_path, follow_links))
            .await
            .map_err(|e| SyncError::scan_error(PathBuf::new(), format!("Scan task failed: {}", e)))?
    }
}

fn walk(root_path: &Path, follow_links: bool) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(root_path).min_depth(1).follow_links(follow_links) {
        let entry = entry.map_err(|e| {
            SyncError::scan_error(root_path, format!("Walk error: {}", e))
        })?;

        let relative_path = entry
            .path()
            .strip_prefix(root_path)
            .map_err(|e| {
                SyncError::path_error(entry.path(), format!("Failed to create relative path: {}", e))
            })?
            .to_path_buf();

        let is_dir = entry.file_type().is_dir();
        let size = if is_dir {
            0
        } else {
            entry.metadata().map(|m| m.len()).unwrap_or(0)
        };

        entries.push(FileEntry {
            relative_path,
            is_dir,
            size,
        });
    }

    Ok(entries)
}

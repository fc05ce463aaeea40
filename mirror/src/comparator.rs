//! File comparison: size first, SHA-256 digest when sizes agree

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::{Result, SyncError};
use crate::fs::{FileSystem, LocalFileSystem};

/// Outcome of comparing a source file with its target counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    /// Same size and same digest
    Identical,
    /// Sizes differ; no digest was computed
    SizeMismatch,
    /// Same size, different digest
    HashMismatch,
}

impl Comparison {
    pub fn needs_replace(self) -> bool {
        !matches!(self, Comparison::Identical)
    }
}

/// File comparator
#[derive(Clone)]
pub struct FileComparator {
    fs: Arc<dyn FileSystem>,
    /// Read buffer size for hashing
    buffer_size: usize,
}

impl Default for FileComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FileComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileComparator")
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

impl FileComparator {
    /// Create a new file comparator reading from the local disk
    pub fn new() -> Self {
        Self {
            fs: Arc::new(LocalFileSystem),
            buffer_size: 64 * 1024, // 64KB buffer
        }
    }

    /// Create a new file comparator with custom buffer size
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            ..Self::new()
        }
    }

    /// Read files through `fs` instead of the local disk
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Compare two files, hashing only when their sizes match
    pub async fn compare<P1: AsRef<Path>, P2: AsRef<Path>>(
        &self,
        source: P1,
        target: P2,
    ) -> Result<Comparison> {
        let source_path = source.as_ref();
        let target_path = target.as_ref();

        let source_len = self.fs.file_size(source_path).await?;
        let target_len = self.fs.file_size(target_path).await?;
        if source_len != target_len {
            return Ok(Comparison::SizeMismatch);
        }

        let source_hash = self.compute_hash(source_path).await?;
        let target_hash = self.compute_hash(target_path).await?;

        if source_hash == target_hash {
            Ok(Comparison::Identical)
        } else {
            Ok(Comparison::HashMismatch)
        }
    }

    /// SHA-256 digest of a whole file, as lowercase hex
    pub async fn compute_hash(&self, path: &Path) -> Result<String> {
        let mut reader = self.fs.open(path).await.map_err(|e| {
            SyncError::hash_error(path, format!("Failed to open file: {}", e))
        })?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(|e| {
                SyncError::hash_error(path, format!("Failed to read file: {}", e))
            })?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

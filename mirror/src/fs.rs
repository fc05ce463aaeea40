//! Filesystem primitives used by the executor

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncRead;

use crate::error::{Result, SyncError};

/// Sequential reader over a file's contents
pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;

/// Filesystem operations performed during a pass
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Size of a file in bytes
    async fn file_size(&self, path: &Path) -> Result<u64>;

    /// Open a file for reading
    async fn open(&self, path: &Path) -> Result<FileReader>;

    /// Delete a single file
    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// Delete an empty directory (never recursive)
    async fn remove_dir(&self, path: &Path) -> Result<()>;

    /// Create a directory and any missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy the full contents of `source` over `destination`, returning bytes written
    async fn copy(&self, source: &Path, destination: &Path) -> Result<u64>;
}

/// The local disk, through `tokio::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn file_size(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).await.map_err(|e| {
            SyncError::path_error(path, format!("Failed to read metadata: {}", e))
        })?;
        Ok(metadata.len())
    }

    async fn open(&self, path: &Path) -> Result<FileReader> {
        let file = fs::File::open(path).await.map_err(|e| {
            SyncError::path_error(path, format!("Failed to open file: {}", e))
        })?;
        Ok(Box::new(file))
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| SyncError::deletion_error(path, e.to_string()))
    }

    async fn remove_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path)
            .await
            .map_err(|e| SyncError::deletion_error(path, e.to_string()))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| SyncError::create_dir_error(path, e.to_string()))
    }

    async fn copy(&self, source: &Path, destination: &Path) -> Result<u64> {
        fs::copy(source, destination)
            .await
            .map_err(|e| SyncError::copy_error(source, destination, e.to_string()))
    }
}

//! Error types for the mirroring engine

use std::path::{Path, PathBuf};

/// Result type alias for mirroring operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type for mirroring operations
///
/// Structural variants (`NotIndependent`, `MissingDirectory`, `InvalidPeriod`,
/// `AlreadyScheduled`) are raised before any work starts. The remaining variants
/// describe a single failed filesystem operation; the executor turns those into
/// `!` log lines instead of returning them.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source and target nest inside each other or are equal
    #[error("Directories are not independent: '{}' and '{}'", source_dir.display(), target_dir.display())]
    NotIndependent {
        source_dir: PathBuf,
        target_dir: PathBuf,
    },

    /// A source or target directory does not exist
    #[error("Directory does not exist: '{}'", path.display())]
    MissingDirectory { path: PathBuf },

    /// Re-check period below the allowed minimum
    #[error("Invalid period of {minutes} minutes (minimum is {minimum})")]
    InvalidPeriod { minutes: u32, minimum: u32 },

    /// A periodic check loop is already running for the entry
    #[error("Entry {id} already has a periodic check running")]
    AlreadyScheduled { id: i64 },

    /// Path-related errors
    #[error("Path error at '{}': {message}", path.display())]
    Path { path: PathBuf, message: String },

    /// Directory scanning errors
    #[error("Directory scan error at '{}': {message}", path.display())]
    DirectoryScan { path: PathBuf, message: String },

    /// Hash computation errors
    #[error("Hash computation error for '{}': {message}", path.display())]
    Hash { path: PathBuf, message: String },

    /// File copying errors
    #[error("File copy error: {message}")]
    FileCopy { message: String },

    /// File or directory deletion errors
    #[error("Deletion error at '{}': {message}", path.display())]
    Deletion { path: PathBuf, message: String },

    /// Directory creation errors
    #[error("Directory creation error at '{}': {message}", path.display())]
    CreateDirectory { path: PathBuf, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether this error is a precondition failure rather than a failed operation
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NotIndependent { .. }
                | Self::MissingDirectory { .. }
                | Self::InvalidPeriod { .. }
                | Self::AlreadyScheduled { .. }
        )
    }

    /// Create a new path error
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new directory scan error
    pub fn scan_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DirectoryScan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new hash error
    pub fn hash_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Hash {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file copy error
    pub fn copy_error(source: &Path, destination: &Path, message: impl Into<String>) -> Self {
        Self::FileCopy {
            message: format!(
                "from '{}' to '{}': {}",
                source.display(),
                destination.display(),
                message.into()
            ),
        }
    }

    /// Create a new deletion error
    pub fn deletion_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Deletion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new directory creation error
    pub fn create_dir_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CreateDirectory {
            path: path.into(),
            message: message.into(),
        }
    }
}

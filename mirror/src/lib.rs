//! Directory Mirroring Library
//!
//! One-way mirroring of a source directory onto a target directory:
//! - Path independence checks between source and target
//! - Recursive scanning and three-way change classification
//! - Size and SHA-256 content verification
//! - Per-entry failure isolation with a human-readable operation log
//! - Observable sync entries with periodic, cancellable re-checks
//! - JSON persistence of the entry list and application settings

pub mod paths;
pub mod size;
pub mod fs;
pub mod scanner;
pub mod comparator;
pub mod diff;
pub mod executor;
pub mod events;
pub mod entry;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod collection;
pub mod error;

// Re-export main types and functions
pub use paths::are_independent;
pub use size::format_size;
pub use fs::{FileSystem, LocalFileSystem};
pub use scanner::{DirectoryScanner, ScanOptions, FileEntry};
pub use comparator::{FileComparator, Comparison};
pub use diff::{DiffEngine, ChangeSet};
pub use executor::{SyncExecutor, PassReport, PassCounts, LogSink};
pub use events::{EntryEvent, Property, SubscriptionId};
pub use entry::{SyncEntry, EntryConfig, SyncStatus, DEFAULT_PERIOD_MINUTES, MIN_PERIOD_MINUTES};
pub use scheduler::{ActivityGate, SchedulerOptions};
pub use settings::{AppSettings, MasterSwitch};
pub use store::{EntryStore, EntryRecord};
pub use collection::EntryCollection;
pub use error::{SyncError, Result};

/// Mirror `source` onto `target` once, returning the report and the operation log
pub async fn sync_directories(
    source: impl AsRef<std::path::Path>,
    target: impl AsRef<std::path::Path>,
) -> Result<(PassReport, Vec<String>)> {
    let entry = SyncEntry::new(
        0,
        EntryConfig::new(source.as_ref(), target.as_ref()),
    )?;
    let report = entry.sync().await?;
    Ok((report, entry.log()))
}

/// Scan a directory and return its entries
pub async fn scan_directory(
    path: impl AsRef<std::path::Path>,
    options: ScanOptions,
) -> Result<Vec<FileEntry>> {
    let scanner = DirectoryScanner::new(options);
    scanner.scan(path).await
}

/// Compare two files by size, then by content digest
pub async fn compare_files(
    file1: impl AsRef<std::path::Path>,
    file2: impl AsRef<std::path::Path>,
) -> Result<Comparison> {
    let comparator = FileComparator::new();
    comparator.compare(file1, file2).await
}

// Test modules
#[cfg(test)]
mod diff_tests;
#[cfg(test)]
mod sync_tests;

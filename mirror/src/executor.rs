//! Applies a change set to the target tree and narrates every action

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::comparator::{Comparison, FileComparator};
use crate::diff::ChangeSet;
use crate::error::Result;
use crate::fs::{FileSystem, LocalFileSystem};
use crate::size::format_size;

/// Receiver of operation log lines, in order
pub trait LogSink: Send {
    fn push_line(&mut self, line: String);
}

impl LogSink for Vec<String> {
    fn push_line(&mut self, line: String) {
        self.push(line);
    }
}

/// Per-kind counts of successful operations in one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassCounts {
    pub removed_files: usize,
    pub removed_dirs: usize,
    pub added_files: usize,
    pub added_dirs: usize,
    pub updated_files: usize,
}

impl PassCounts {
    pub fn total(&self) -> usize {
        self.removed_files + self.removed_dirs + self.added_files + self.added_dirs + self.updated_files
    }

    /// Summary line listing the non-zero counts, or `Nothing to update`
    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            ("removed", self.removed_files, "file", "files"),
            ("removed", self.removed_dirs, "directory", "directories"),
            ("added", self.added_files, "file", "files"),
            ("added", self.added_dirs, "directory", "directories"),
            ("updated", self.updated_files, "file", "files"),
        ]
        .iter()
        .filter(|(_, count, _, _)| *count > 0)
        .map(|(verb, count, singular, plural)| {
            let noun = if *count == 1 { singular } else { plural };
            format!("{} {} {}", verb, count, noun)
        })
        .collect();

        if parts.is_empty() {
            return "Nothing to update".to_string();
        }

        let joined = parts.join(", ");
        let mut chars = joined.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => joined,
        }
    }
}

/// Outcome of executing one change set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub counts: PassCounts,
    /// Whether any individual operation failed
    pub errored: bool,
    pub elapsed: Duration,
}

/// Format the elapsed-time log line
pub fn elapsed_line(elapsed: Duration) -> String {
    if elapsed.as_millis() >= 1000 {
        format!("Finished in {:.2} s", elapsed.as_secs_f64())
    } else {
        format!("Finished in {} ms", elapsed.as_millis())
    }
}

/// Executes removals, additions and verifications, one entry at a time
#[derive(Clone)]
pub struct SyncExecutor {
    fs: Arc<dyn FileSystem>,
    comparator: FileComparator,
}

impl Default for SyncExecutor {
    fn default() -> Self {
        Self::new(Arc::new(LocalFileSystem))
    }
}

impl std::fmt::Debug for SyncExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncExecutor")
            .field("comparator", &self.comparator)
            .finish_non_exhaustive()
    }
}

impl SyncExecutor {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            comparator: FileComparator::new().with_file_system(Arc::clone(&fs)),
            fs,
        }
    }

    pub fn with_comparator(mut self, comparator: FileComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Apply `changes` and write one log line per action, then the summary and elapsed time.
    ///
    /// A failed entry is logged with a `!` prefix and marks the pass errored;
    /// the remaining entries are still processed.
    pub async fn execute<S: LogSink>(
        &self,
        source_root: &Path,
        target_root: &Path,
        changes: &ChangeSet,
        log: &mut S,
    ) -> PassReport {
        let start_time = Instant::now();
        let mut report = PassReport::default();

        for entry in &changes.to_remove {
            let path = target_root.join(&entry.relative_path);
            let display = entry.relative_path.display();

            let result = if entry.is_dir {
                self.fs
                    .remove_dir(&path)
                    .await
                    .map(|()| format!("- Removed directory {}", display))
            } else {
                self.remove_file(&path)
                    .await
                    .map(|size| format!("- Removed {} ({})", display, format_size(size)))
            };

            match result {
                Ok(line) => {
                    debug!(path = %path.display(), "removed");
                    if entry.is_dir {
                        report.counts.removed_dirs += 1;
                    } else {
                        report.counts.removed_files += 1;
                    }
                    log.push_line(line);
                }
                Err(e) => fail(&mut report, log, "remove", &entry.relative_path, &e.to_string()),
            }
        }

        for entry in &changes.to_add {
            let source_path = source_root.join(&entry.relative_path);
            let target_path = target_root.join(&entry.relative_path);
            let display = entry.relative_path.display();

            let result = if entry.is_dir {
                self.fs
                    .create_dir_all(&target_path)
                    .await
                    .map(|()| format!("+ Created directory {}", display))
            } else {
                self.fs
                    .copy(&source_path, &target_path)
                    .await
                    .map(|size| format!("+ Added {} ({})", display, format_size(size)))
            };

            match result {
                Ok(line) => {
                    debug!(path = %target_path.display(), "added");
                    if entry.is_dir {
                        report.counts.added_dirs += 1;
                    } else {
                        report.counts.added_files += 1;
                    }
                    log.push_line(line);
                }
                Err(e) => fail(&mut report, log, "add", &entry.relative_path, &e.to_string()),
            }
        }

        for relative_path in &changes.to_verify {
            let source_path = source_root.join(relative_path);
            let target_path = target_root.join(relative_path);

            let comparison = match self.comparator.compare(&source_path, &target_path).await {
                Ok(comparison) => comparison,
                Err(e) => {
                    fail(&mut report, log, "verify", relative_path, &e.to_string());
                    continue;
                }
            };

            let reason = match comparison {
                Comparison::Identical => continue,
                Comparison::SizeMismatch => "size mismatch",
                Comparison::HashMismatch => "hash mismatch",
            };

            match self.fs.copy(&source_path, &target_path).await {
                Ok(_) => {
                    debug!(path = %target_path.display(), reason, "replaced");
                    report.counts.updated_files += 1;
                    log.push_line(format!("* Replaced {} ({})", relative_path.display(), reason));
                }
                Err(e) => fail(&mut report, log, "replace", relative_path, &e.to_string()),
            }
        }

        log.push_line(report.counts.summary());
        report.elapsed = start_time.elapsed();
        log.push_line(elapsed_line(report.elapsed));

        report
    }

    async fn remove_file(&self, path: &Path) -> Result<u64> {
        let size = self.fs.file_size(path).await?;
        self.fs.remove_file(path).await?;
        Ok(size)
    }
}

fn fail<S: LogSink>(report: &mut PassReport, log: &mut S, action: &str, relative_path: &Path, error: &str) {
    warn!(path = %relative_path.display(), action, error, "operation failed");
    report.errored = true;
    log.push_line(format!("! Failed to {} {}: {}", action, relative_path.display(), error));
}

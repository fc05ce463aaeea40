//! Change detection between a source and a target tree

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scanner::{DirectoryScanner, FileEntry};

/// The three disjoint work lists of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Target entries with no counterpart in the source.
    /// Files come before directories, and nested directories before their parents.
    pub to_remove: Vec<FileEntry>,
    /// Source entries with no counterpart in the target.
    /// Directories come before files, parents before children.
    pub to_add: Vec<FileEntry>,
    /// Relative paths that are files on both sides
    pub to_verify: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty() && self.to_verify.is_empty()
    }
}

/// Diff engine producing change sets
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    scanner: DirectoryScanner,
}

impl DiffEngine {
    /// Create a new diff engine
    pub fn new(scanner: DirectoryScanner) -> Self {
        Self { scanner }
    }

    /// Enumerate both trees and classify every entry
    pub async fn diff(&self, source_dir: &Path, target_dir: &Path) -> Result<ChangeSet> {
        let source_entries = self.scanner.scan(source_dir).await?;
        let target_entries = self.scanner.scan(target_dir).await?;
        Ok(Self::plan(source_entries, target_entries))
    }

    /// Classify already-enumerated entries.
    ///
    /// A path that is a file on one side and a directory on the other is
    /// removed from the target and added again from the source.
    pub fn plan(source_entries: Vec<FileEntry>, target_entries: Vec<FileEntry>) -> ChangeSet {
        let source_map: HashMap<&PathBuf, &FileEntry> = source_entries
            .iter()
            .map(|entry| (&entry.relative_path, entry))
            .collect();

        let target_map: HashMap<&PathBuf, &FileEntry> = target_entries
            .iter()
            .map(|entry| (&entry.relative_path, entry))
            .collect();

        let mut changes = ChangeSet::default();

        for target_entry in &target_entries {
            match source_map.get(&target_entry.relative_path) {
                Some(source_entry) if source_entry.is_dir == target_entry.is_dir => {}
                _ => changes.to_remove.push(target_entry.clone()),
            }
        }

        for source_entry in &source_entries {
            match target_map.get(&source_entry.relative_path) {
                Some(target_entry) if target_entry.is_dir == source_entry.is_dir => {
                    if !source_entry.is_dir {
                        changes.to_verify.push(source_entry.relative_path.clone());
                    }
                }
                _ => changes.to_add.push(source_entry.clone()),
            }
        }

        changes.to_remove.sort_by(|a, b| match (a.is_dir, b.is_dir) {
            (false, false) => a.relative_path.cmp(&b.relative_path),
            (true, true) => b.relative_path.cmp(&a.relative_path),
            _ => a.is_dir.cmp(&b.is_dir),
        });
        changes.to_add.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        changes.to_verify.sort();

        changes
    }
}

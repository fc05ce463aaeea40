//! Pass-level tests: a sync entry mirroring real directory trees

use super::*;
use crate::fs::FileReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use parking_lot::Mutex;
use rstest::*;
use tempfile::TempDir;

struct Pair {
    _temp_dir: TempDir,
    source: PathBuf,
    target: PathBuf,
}

impl Pair {
    fn entry(&self) -> SyncEntry {
        SyncEntry::new(1, EntryConfig::new(&self.source, &self.target)).unwrap()
    }

    fn write_source(&self, relative: &str, content: &[u8]) {
        write(&self.source, relative, content);
    }

    fn write_target(&self, relative: &str, content: &[u8]) {
        write(&self.target, relative, content);
    }
}

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

#[fixture]
fn pair() -> Pair {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source");
    let target = temp_dir.path().join("target");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::create_dir_all(&target).unwrap();
    Pair {
        _temp_dir: temp_dir,
        source,
        target,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    Open,
    Copy,
    Remove,
}

/// Fails one kind of operation on every path whose file name matches
struct FailingFs {
    op: Op,
    file_name: &'static str,
}

impl FailingFs {
    fn new(op: Op, file_name: &'static str) -> Arc<Self> {
        Arc::new(Self { op, file_name })
    }

    fn check(&self, op: Op, path: &Path) -> Result<()> {
        if op == self.op && path.file_name().map_or(false, |name| name == self.file_name) {
            return Err(SyncError::path_error(path, "file is locked"));
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystem for FailingFs {
    async fn file_size(&self, path: &Path) -> Result<u64> {
        LocalFileSystem.file_size(path).await
    }

    async fn open(&self, path: &Path) -> Result<FileReader> {
        self.check(Op::Open, path)?;
        LocalFileSystem.open(path).await
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        self.check(Op::Remove, path)?;
        LocalFileSystem.remove_file(path).await
    }

    async fn remove_dir(&self, path: &Path) -> Result<()> {
        self.check(Op::Remove, path)?;
        LocalFileSystem.remove_dir(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        LocalFileSystem.create_dir_all(path).await
    }

    async fn copy(&self, source: &Path, destination: &Path) -> Result<u64> {
        self.check(Op::Copy, destination)?;
        LocalFileSystem.copy(source, destination).await
    }
}

fn overdue_entry(pair: &Pair, fs: Arc<FailingFs>) -> SyncEntry {
    SyncEntry::new(
        1,
        EntryConfig::new(&pair.source, &pair.target)
            .last_checked(Local::now() - ChronoDuration::days(1)),
    )
    .unwrap()
    .with_executor(SyncExecutor::new(fs))
}

fn failures(entry: &SyncEntry) -> Vec<String> {
    entry
        .log()
        .into_iter()
        .filter(|line| line.starts_with('!'))
        .collect()
}

fn count_prefix(log: &[String], prefix: char) -> usize {
    log.iter().filter(|line| line.starts_with(prefix)).count()
}

#[rstest]
#[tokio::test]
async fn test_single_file_example(pair: Pair) {
    pair.write_source("a.txt", b"x");
    let entry = pair.entry();

    let report = entry.sync().await.unwrap();

    assert_eq!(std::fs::read(pair.target.join("a.txt")).unwrap(), b"x");
    let log = entry.log();
    assert_eq!(log[0], "Syncing started...");
    assert_eq!(count_prefix(&log, '+'), 1);
    assert_eq!(log[1], "+ Added a.txt (1 B)");
    assert!(log.contains(&"Added 1 file".to_string()));
    assert!(log.last().unwrap().starts_with("Finished in "));
    assert_eq!(entry.status(), SyncStatus::Synced);
    assert_eq!(report.counts.added_files, 1);
    assert!(!report.errored);
}

#[rstest]
#[tokio::test]
async fn test_second_pass_is_idempotent(pair: Pair) {
    pair.write_source("docs/readme.md", b"hello");
    pair.write_source("docs/img/logo.png", &[0u8; 2048]);
    pair.write_target("stale.txt", b"old");
    let entry = pair.entry();

    let first = entry.sync().await.unwrap();
    assert!(first.counts.total() > 0);

    let second = entry.sync().await.unwrap();
    assert_eq!(second.counts.total(), 0);
    let log = entry.log();
    assert_eq!(log.len(), 3, "log does not accumulate across passes: {:?}", log);
    assert_eq!(log[1], "Nothing to update");
    assert_eq!(entry.status(), SyncStatus::Synced);
}

#[rstest]
#[tokio::test]
async fn test_round_trip_matches_source(pair: Pair) {
    pair.write_source("one.txt", b"first");
    pair.write_source("nested/two.txt", b"second");
    pair.write_source("nested/deeper/three.bin", &[7u8; 70 * 1024]);
    pair.write_source(".hidden", b"h");
    std::fs::create_dir_all(pair.source.join("empty")).unwrap();
    pair.write_target("nested/two.txt", b"SECOND");

    pair.entry().sync().await.unwrap();

    let scanner = DirectoryScanner::default();
    let mut source_entries = scanner.scan(&pair.source).await.unwrap();
    let mut target_entries = scanner.scan(&pair.target).await.unwrap();
    source_entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    target_entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    assert_eq!(source_entries, target_entries);

    let comparator = FileComparator::new();
    for entry in source_entries.iter().filter(|e| !e.is_dir) {
        assert_eq!(
            comparator.compute_hash(&pair.source.join(&entry.relative_path)).await.unwrap(),
            comparator.compute_hash(&pair.target.join(&entry.relative_path)).await.unwrap(),
            "content differs for {}",
            entry.relative_path.display()
        );
    }
}

#[rstest]
#[tokio::test]
async fn test_target_only_entries_are_removed(pair: Pair) {
    pair.write_target("only_in_target.txt", b"1234");
    pair.write_target("old/deep/er/file.txt", b"x");
    std::fs::create_dir_all(pair.target.join("empty")).unwrap();
    let entry = pair.entry();

    let report = entry.sync().await.unwrap();

    assert!(!pair.target.join("only_in_target.txt").exists());
    assert!(!pair.target.join("old").exists());
    assert!(!pair.target.join("empty").exists());
    assert_eq!(report.counts.removed_files, 2);
    assert_eq!(report.counts.removed_dirs, 4);
    assert_eq!(entry.status(), SyncStatus::Synced);

    let log = entry.log();
    assert!(log.contains(&"- Removed only_in_target.txt (4 B)".to_string()));
    assert!(log.contains(&"- Removed directory empty".to_string()));
    assert!(log.contains(&"Removed 2 files, removed 4 directories".to_string()));
}

#[rstest]
#[tokio::test]
async fn test_size_and_hash_mismatch_are_replaced(pair: Pair) {
    pair.write_source("sized.txt", b"longer content");
    pair.write_target("sized.txt", b"short");
    pair.write_source("hashed.txt", b"abcd");
    pair.write_target("hashed.txt", b"abce");
    pair.write_source("same.txt", b"same");
    pair.write_target("same.txt", b"same");
    let entry = pair.entry();

    let report = entry.sync().await.unwrap();

    assert_eq!(report.counts.updated_files, 2);
    let log = entry.log();
    assert!(log.contains(&"* Replaced sized.txt (size mismatch)".to_string()));
    assert!(log.contains(&"* Replaced hashed.txt (hash mismatch)".to_string()));
    assert!(!log.iter().any(|line| line.contains("same.txt")));
    assert!(log.contains(&"Updated 2 files".to_string()));
    assert_eq!(std::fs::read(pair.target.join("hashed.txt")).unwrap(), b"abcd");
}

#[rstest]
#[tokio::test]
async fn test_kind_mismatch_is_fixed_in_one_pass(pair: Pair) {
    pair.write_source("thing/inside.txt", b"in");
    pair.write_target("thing", b"was a file");
    let entry = pair.entry();

    entry.sync().await.unwrap();

    assert!(pair.target.join("thing").is_dir());
    assert_eq!(std::fs::read(pair.target.join("thing/inside.txt")).unwrap(), b"in");
    assert_eq!(entry.status(), SyncStatus::Synced);
}

#[rstest]
#[tokio::test]
async fn test_failure_is_isolated(pair: Pair) {
    pair.write_source("a_first.txt", b"a");
    pair.write_source("locked.txt", b"locked");
    pair.write_source("z_last.txt", b"z");
    pair.write_target("stale.txt", b"s");
    let entry = overdue_entry(&pair, FailingFs::new(Op::Copy, "locked.txt"));
    let before = entry.last_checked();

    let report = entry.sync().await.unwrap();

    assert!(report.errored);
    assert_eq!(entry.status(), SyncStatus::Error);
    assert!(entry.last_checked() > before);
    assert!(pair.target.join("a_first.txt").exists());
    assert!(pair.target.join("z_last.txt").exists());
    assert!(!pair.target.join("locked.txt").exists());
    assert!(!pair.target.join("stale.txt").exists());

    let failures = failures(&entry);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("! Failed to add locked.txt: "));
    assert!(failures[0].contains("file is locked"));
    assert_eq!(report.counts.added_files, 2);
    assert_eq!(report.counts.removed_files, 1);
}

#[rstest]
#[tokio::test]
async fn test_remove_failure_is_isolated(pair: Pair) {
    pair.write_target("stuck.txt", b"stuck");
    pair.write_target("stale.txt", b"stale");
    std::fs::create_dir_all(pair.target.join("stuck_dir")).unwrap();
    pair.write_source("new.txt", b"new");
    let entry = overdue_entry(&pair, FailingFs::new(Op::Remove, "stuck.txt"));

    let report = entry.sync().await.unwrap();

    assert!(report.errored);
    assert_eq!(entry.status(), SyncStatus::Error);
    assert!(pair.target.join("stuck.txt").exists());
    assert!(!pair.target.join("stale.txt").exists());
    assert!(!pair.target.join("stuck_dir").exists());
    assert!(pair.target.join("new.txt").exists());

    let failures = failures(&entry);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("! Failed to remove stuck.txt: "));
    assert_eq!(report.counts.removed_files, 1);
    assert_eq!(report.counts.removed_dirs, 1);
    assert_eq!(report.counts.added_files, 1);
}

#[rstest]
#[tokio::test]
async fn test_hash_failure_skips_copy(pair: Pair) {
    pair.write_source("doc.txt", b"abcd");
    pair.write_target("doc.txt", b"abce");
    pair.write_source("other.txt", b"new");
    pair.write_target("other.txt", b"old");
    let entry = overdue_entry(&pair, FailingFs::new(Op::Open, "doc.txt"));
    let before = entry.last_checked();

    let report = entry.sync().await.unwrap();

    assert!(report.errored);
    assert_eq!(entry.status(), SyncStatus::Error);
    assert!(entry.last_checked() > before);
    assert_eq!(std::fs::read(pair.target.join("doc.txt")).unwrap(), b"abce");
    assert_eq!(std::fs::read(pair.target.join("other.txt")).unwrap(), b"new");

    let log = entry.log();
    let failures = failures(&entry);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("! Failed to verify doc.txt: "));
    assert!(!log.iter().any(|line| line.starts_with("* Replaced doc.txt")));
    assert!(log.contains(&"* Replaced other.txt (hash mismatch)".to_string()));
    assert_eq!(report.counts.updated_files, 1);
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn test_scan_failure_ends_in_error(pair: Pair) {
    pair.write_source("a.txt", b"x");
    // Following links makes the walk hit a filesystem loop
    std::os::unix::fs::symlink(&pair.source, pair.source.join("loop")).unwrap();
    let scanner = DirectoryScanner::new(ScanOptions { follow_links: true });
    let entry = SyncEntry::new(
        1,
        EntryConfig::new(&pair.source, &pair.target)
            .last_checked(Local::now() - ChronoDuration::days(1)),
    )
    .unwrap()
    .with_diff_engine(DiffEngine::new(scanner));
    let before = entry.last_checked();

    let report = entry.sync().await.unwrap();

    assert!(report.errored);
    assert_eq!(report.counts.total(), 0);
    assert_eq!(entry.status(), SyncStatus::Error);
    assert!(entry.last_checked() > before);

    let log = entry.log();
    assert_eq!(log[0], "Syncing started...");
    assert_eq!(log.len(), 2);
    assert!(log[1].starts_with("! Failed to enumerate entries: "));
    assert!(!pair.target.join("a.txt").exists());
}

#[rstest]
#[tokio::test]
async fn test_nested_paths_fail_before_any_change(pair: Pair) {
    pair.write_source("a.txt", b"x");
    let entry = pair.entry();
    entry.sync().await.unwrap();
    let log_before = entry.log();
    let checked_before = entry.last_checked();

    entry.set_target_dir(pair.source.join("inner"));
    let result = entry.sync().await;

    assert!(matches!(result, Err(SyncError::NotIndependent { .. })));
    assert!(result.unwrap_err().is_structural());
    assert_eq!(entry.log(), log_before);
    assert_eq!(entry.status(), SyncStatus::Synced);
    assert_eq!(entry.last_checked(), checked_before);
    assert!(!pair.source.join("inner").exists());
}

#[rstest]
#[tokio::test]
async fn test_missing_directory_is_structural(pair: Pair) {
    let entry = pair.entry();
    entry.set_source_dir(pair.source.with_file_name("missing"));

    let result = entry.sync().await;

    assert!(matches!(result, Err(SyncError::MissingDirectory { .. })));
    assert!(entry.log().is_empty());
    assert_eq!(entry.status(), SyncStatus::Idle);
}

#[rstest]
#[tokio::test]
async fn test_pass_notifications(pair: Pair) {
    pair.write_source("a.txt", b"x");
    let entry = pair.entry();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    entry.subscribe(move |_, event| sink.lock().push(*event));

    entry.sync().await.unwrap();

    let events = events.lock();
    let statuses: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            EntryEvent::StatusChanged { previous, current } => Some((*previous, *current)),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            (SyncStatus::Idle, SyncStatus::Syncing),
            (SyncStatus::Syncing, SyncStatus::Synced),
        ]
    );

    let log_events = events
        .iter()
        .filter(|event| **event == EntryEvent::PropertyChanged(Property::Log))
        .count();
    assert_eq!(log_events, entry.log().len());
    assert!(events.contains(&EntryEvent::PropertyChanged(Property::LastChecked)));
}

#[rstest]
#[tokio::test]
async fn test_concurrent_passes_are_serialized(pair: Pair) {
    pair.write_source("a.txt", b"x");
    pair.write_source("dir/b.txt", b"y");
    let entry = pair.entry();

    let (first, second) = tokio::join!(entry.sync(), entry.sync());
    let mut totals = vec![first.unwrap().counts.total(), second.unwrap().counts.total()];
    totals.sort();

    assert_eq!(totals, vec![0, 3]);
}

#[rstest]
#[tokio::test]
async fn test_sync_directories_once(pair: Pair) {
    pair.write_source("report.csv", &[1u8; 1536]);

    let (report, log) = sync_directories(&pair.source, &pair.target).await.unwrap();

    assert_eq!(report.counts.added_files, 1);
    assert!(log.contains(&"+ Added report.csv (1.5 KB)".to_string()));
}

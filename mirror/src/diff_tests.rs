//! Unit tests for change classification and ordering

use super::*;
use std::path::PathBuf;
use rstest::*;
use test_case::test_case;

fn p(path: &str) -> PathBuf {
    path.split('/').collect()
}

fn file(path: &str) -> FileEntry {
    FileEntry::file(p(path), 1)
}

fn dir(path: &str) -> FileEntry {
    FileEntry::dir(p(path))
}

#[fixture]
fn nested_target() -> Vec<FileEntry> {
    vec![
        dir("a"),
        dir("a/b"),
        dir("a/b/c"),
        file("a/b/c/deep.txt"),
        file("a/top.txt"),
        file("z.txt"),
    ]
}

#[rstest]
fn test_removal_order_files_then_nested_dirs(nested_target: Vec<FileEntry>) {
    let changes = DiffEngine::plan(Vec::new(), nested_target);

    assert_eq!(
        changes.to_remove,
        vec![
            file("a/b/c/deep.txt"),
            file("a/top.txt"),
            file("z.txt"),
            dir("a/b/c"),
            dir("a/b"),
            dir("a"),
        ]
    );
    assert!(changes.to_add.is_empty());
    assert!(changes.to_verify.is_empty());
}

#[rstest]
fn test_add_order_dirs_then_files(nested_target: Vec<FileEntry>) {
    let changes = DiffEngine::plan(nested_target, Vec::new());

    assert_eq!(
        changes.to_add,
        vec![
            dir("a"),
            dir("a/b"),
            dir("a/b/c"),
            file("a/b/c/deep.txt"),
            file("a/top.txt"),
            file("z.txt"),
        ]
    );
    assert!(changes.to_remove.is_empty());
}

#[test]
fn test_common_dirs_are_not_verified() {
    let source = vec![dir("docs"), file("docs/a.txt")];
    let target = vec![dir("docs"), file("docs/a.txt")];

    let changes = DiffEngine::plan(source, target);
    assert!(changes.to_remove.is_empty());
    assert!(changes.to_add.is_empty());
    assert_eq!(changes.to_verify, vec![p("docs/a.txt")]);
}

#[test_case(file("x"), dir("x") ; "file in source, directory in target")]
#[test_case(dir("x"), file("x") ; "directory in source, file in target")]
fn test_kind_mismatch_is_replaced(source_entry: FileEntry, target_entry: FileEntry) {
    let changes = DiffEngine::plan(vec![source_entry.clone()], vec![target_entry.clone()]);

    assert_eq!(changes.to_remove, vec![target_entry]);
    assert_eq!(changes.to_add, vec![source_entry]);
    assert!(changes.to_verify.is_empty());
}

#[test]
fn test_lists_are_disjoint() {
    let source = vec![file("keep"), file("new"), dir("shared")];
    let target = vec![file("keep"), file("old"), dir("shared"), dir("gone")];

    let changes = DiffEngine::plan(source, target);

    assert_eq!(changes.to_remove, vec![file("old"), dir("gone")]);
    assert_eq!(changes.to_add, vec![file("new")]);
    assert_eq!(changes.to_verify, vec![p("keep")]);

    for entry in &changes.to_add {
        assert!(!changes.to_remove.contains(entry));
        assert!(!changes.to_verify.contains(&entry.relative_path));
    }
}

#[test]
fn test_empty_trees() {
    let changes = DiffEngine::plan(Vec::new(), Vec::new());
    assert!(changes.is_empty());
}

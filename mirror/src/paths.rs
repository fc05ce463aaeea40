//! Structural independence check for a source/target directory pair

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Whether neither directory contains the other.
///
/// Both paths are made absolute against the current directory and normalized
/// lexically (no filesystem access), then compared case-insensitively with a
/// trailing separator so that `/data/a` does not count as a prefix of `/data/ab`.
/// Empty paths, equal paths and nested paths are not independent.
pub fn are_independent(a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
    let (a, b) = (a.as_ref(), b.as_ref());
    if a.as_os_str().is_empty() || b.as_os_str().is_empty() {
        return false;
    }

    let (Some(a), Some(b)) = (comparable_form(a), comparable_form(b)) else {
        return false;
    };

    if a == b {
        return false;
    }
    !a.starts_with(&b) && !b.starts_with(&a)
}

/// Absolute, lexically normalized, lower-cased form ending in one separator
fn comparable_form(path: &Path) -> Option<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };

    let normalized = normalize(&absolute);
    let mut text = normalized.to_string_lossy().to_lowercase();
    while text.ends_with(MAIN_SEPARATOR) || text.ends_with('/') {
        text.pop();
    }
    text.push(MAIN_SEPARATOR);
    Some(text)
}

/// Resolve `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

//! File system scanner for discovering stylesheets.
//!
//! Directories are walked recursively for `.css` files. Files whose name
//! starts with the sheet prefix are output of an earlier run and skipped.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// Scan a directory for stylesheets, sorted by path.
pub fn scan_directory(root: &Path, prefix: &str) -> Vec<PathBuf> {
    if !root.exists() {
        return vec![];
    }

    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_stylesheet(path) && !is_generated(path, prefix))
        .collect();

    found.sort();
    found
}

/// Expand source paths into stylesheet files.
///
/// Directories are scanned; anything else is kept as given so that a
/// missing file surfaces as a read error for that file. Duplicates are
/// dropped, first occurrence wins.
pub fn scan_sources(sources: &[PathBuf], prefix: &str) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut result = vec![];

    for source in sources {
        let files = if source.is_dir() {
            scan_directory(source, prefix)
        } else {
            vec![source.clone()]
        };
        for file in files {
            if seen.insert(absolute(&file)) {
                result.push(file);
            }
        }
    }

    result
}

/// Check for a `.css` extension.
pub fn is_stylesheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("css"))
}

fn is_generated(path: &Path, prefix: &str) -> bool {
    !prefix.is_empty()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix))
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
///
/// The file system is not consulted, so the path need not exist.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize(&joined)
}

/// Resolve `.` and `..` components without touching the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    if !out.has_root() {
                        out.push("..");
                    }
                } else {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out
}

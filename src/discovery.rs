use std::path::{Path, PathBuf};

use anyhow::Context as _;
use walkdir::WalkDir;

use crate::foundation::error::{SongreelError, SongreelResult};

/// Resolve `path` to a sorted list of media files.
///
/// A file path yields itself. A directory yields its files whose extension is in `extensions`
/// (case-insensitive, without the dot), descending into subdirectories when `recursive` is set.
pub fn discover_media(
    path: &Path,
    extensions: &[&str],
    recursive: bool,
) -> SongreelResult<Vec<PathBuf>> {
    let path = if cfg!(target_os = "linux") {
        case_corrected(path)
    } else {
        path.to_path_buf()
    };

    if path.is_file() {
        return Ok(vec![path]);
    }
    if !path.is_dir() {
        return Err(SongreelError::discovery(format!(
            "couldn't find a file or folder at '{}'",
            path.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    let walker = WalkDir::new(&path)
        .follow_links(true)
        .min_depth(1)
        .max_depth(max_depth);
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to scan '{}'", path.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(SongreelError::discovery(format!(
            "couldn't find files of a supported type in '{}' (supported: {})",
            path.display(),
            extensions.join(", ")
        )));
    }

    files.sort();
    tracing::debug!(count = files.len(), path = %path.display(), "discovered media");
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Match the last component of `path` case-insensitively against its parent's entries.
///
/// Returns `path` unchanged when it already exists or nothing matches.
pub fn case_corrected(path: &Path) -> PathBuf {
    if path.exists() {
        return path.to_path_buf();
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let Ok(entries) = std::fs::read_dir(parent) else {
        return path.to_path_buf();
    };

    entries
        .flatten()
        .find(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .map(|entry| path.with_file_name(entry.file_name()))
        .unwrap_or_else(|| path.to_path_buf())
}

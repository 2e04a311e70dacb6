//! Path validation and normalisation.
//!
//! Unlike a storage root sandbox, paths here may be absolute or relative and
//! may legitimately climb with `..`; the only rewriting done is dropping
//! redundant `.` components.

use crate::error::{ErrorKind, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Drop `.` components, keeping everything else as written.
///
/// ```
/// use std::path::Path;
/// use trawl_storage::normalize;
/// assert_eq!(normalize("./data/./report.csv"), Path::new("data/report.csv"));
/// assert_eq!(normalize("/srv/../data/"), Path::new("/srv/../data"));
/// assert_eq!(normalize("."), Path::new("."));
/// ```
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let normalized: PathBuf = path.as_ref().components().filter(|c| !matches!(c, Component::CurDir)).collect();
    match normalized.as_os_str().is_empty() {
        true => PathBuf::from("."),
        false => normalized,
    }
}

/// Strip any leading separator and lower-case an extension.
///
/// ```
/// use trawl_storage::normalize_suffix;
/// assert_eq!(normalize_suffix(".CSV"), "csv");
/// assert_eq!(normalize_suffix("json"), "json");
/// assert_eq!(normalize_suffix(""), "");
/// ```
pub fn normalize_suffix(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// The normalised extension of the final path component; empty when there
/// is none.
pub fn suffix_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|ext| normalize_suffix(&ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Whether the final component's stem marks it as hidden (`.` or `_` prefix).
///
/// Only the final component is inspected; a file inside a dot-directory is
/// not itself hidden.
pub fn is_hidden(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().starts_with(['.', '_']))
        .unwrap_or(false)
}

/// Check that a root path exists and is a file or directory.
pub fn validate_root(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = normalize(path);
    let metadata = fs::metadata(&path).map_err(|e| ErrorKind::from_io(e, &path))?;
    if !metadata.is_file() && !metadata.is_dir() {
        exn::bail!(ErrorKind::InvalidPath(path));
    }
    Ok(path)
}

/// Validate a candidate entry.
///
/// Returns `Ok(None)` for hidden entries: they are skipped, not rejected.
/// When `verbose` is set the skip is surfaced as a warning.
pub fn validate(path: impl AsRef<Path>, verbose: bool) -> Result<Option<PathBuf>> {
    let path = validate_root(path)?;
    if is_hidden(&path) {
        if verbose {
            tracing::warn!(path = %path.display(), "skipping hidden entry");
        } else {
            tracing::debug!(path = %path.display(), "skipping hidden entry");
        }
        return Ok(None);
    }
    Ok(Some(path))
}

use crate::error::{ErrorKind, Result};
use crate::units::{HumanSize, bytes_to_human};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Usage of the volume a path lives on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeUsage {
    pub total: Option<HumanSize>,
    pub used: Option<HumanSize>,
    /// Space available to unprivileged users.
    pub free: Option<HumanSize>,
}

impl VolumeUsage {
    /// Snapshot the volume holding `path`. Fields the platform can't report
    /// are left empty.
    pub fn of(path: &Path) -> Self {
        let total = fs2::total_space(path);
        let free = fs2::free_space(path);
        let available = fs2::available_space(path);
        if let Err(err) = &total {
            tracing::warn!(path = %path.display(), error = %err, "could not read volume usage");
        }
        let used = match (&total, &free) {
            (Ok(total), Ok(free)) => Some(total.saturating_sub(*free)),
            _ => None,
        };
        Self {
            total: total.ok().and_then(bytes_to_human),
            used: used.and_then(bytes_to_human),
            free: available.ok().and_then(bytes_to_human),
        }
    }
}

/// OS-level statistics for one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatEntry {
    pub path: PathBuf,
    /// Every non-zero numeric stat field, keyed by its `st_*` name.
    pub attributes: BTreeMap<&'static str, HumanSize>,
    pub file_size: Option<HumanSize>,
    pub modified: Option<String>,
    pub volume: VolumeUsage,
}

impl StatEntry {
    pub fn size_bytes(&self) -> u64 {
        self.file_size.as_ref().map(|size| size.bytes).unwrap_or(0)
    }
}

#[cfg(unix)]
fn raw_attributes(metadata: &fs::Metadata) -> Vec<(&'static str, u64)> {
    use std::os::unix::fs::MetadataExt;
    let seconds = |secs: i64| u64::try_from(secs).unwrap_or(0);
    vec![
        ("st_dev", metadata.dev()),
        ("st_ino", metadata.ino()),
        ("st_mode", u64::from(metadata.mode())),
        ("st_nlink", metadata.nlink()),
        ("st_uid", u64::from(metadata.uid())),
        ("st_gid", u64::from(metadata.gid())),
        ("st_rdev", metadata.rdev()),
        ("st_size", metadata.size()),
        ("st_blksize", metadata.blksize()),
        ("st_blocks", metadata.blocks()),
        ("st_atime", seconds(metadata.atime())),
        ("st_mtime", seconds(metadata.mtime())),
        ("st_ctime", seconds(metadata.ctime())),
    ]
}

#[cfg(not(unix))]
fn raw_attributes(metadata: &fs::Metadata) -> Vec<(&'static str, u64)> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let seconds = |time: std::io::Result<SystemTime>| {
        time.ok().and_then(|t| t.duration_since(UNIX_EPOCH).ok()).map(|d| d.as_secs()).unwrap_or(0)
    };
    vec![
        ("st_size", metadata.len()),
        ("st_atime", seconds(metadata.accessed())),
        ("st_mtime", seconds(metadata.modified())),
        ("st_ctime", seconds(metadata.created())),
    ]
}

/// Stat `path` and the volume it lives on. Blocking.
pub fn stat_path(path: impl AsRef<Path>) -> Result<StatEntry> {
    let path = path.as_ref();
    let metadata = fs::metadata(path).map_err(|_| ErrorKind::Stat(path.to_path_buf()))?;
    let attributes = raw_attributes(&metadata)
        .into_iter()
        .filter_map(|(name, value)| bytes_to_human(value).map(|size| (name, size)))
        .collect();
    let modified = metadata
        .modified()
        .ok()
        .map(OffsetDateTime::from)
        .and_then(|at| at.format(&Rfc3339).ok());
    Ok(StatEntry {
        path: path.to_path_buf(),
        attributes,
        file_size: bytes_to_human(metadata.len()),
        modified,
        volume: VolumeUsage::of(path),
    })
}

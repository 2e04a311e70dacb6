use crate::error::{ErrorKind, Result};
use crate::stats::{StatEntry, stat_path};
use crate::units::{HumanSize, bytes_to_human};
use exn::ResultExt;
use futures::StreamExt;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::pin::pin;
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::sync::OnceCell;
use tracing::instrument;
use trawl_asyncutils::WorkerPool;

const EXPORT_PREFIX: &str = "metadata_stats";
const EXPORT_EXTENSION: &str = "json";

/// Identity (file name or full path) to statistics, in input order.
pub type StatMap = IndexMap<String, StatEntry>;

fn identity(path: &Path, full_posix: bool) -> String {
    match (full_posix, path.file_name()) {
        (false, Some(name)) => name.to_string_lossy().into_owned(),
        _ => path.display().to_string(),
    }
}

/// Validate then stat every path on `pool`.
///
/// Hidden entries are skipped. A path that doesn't exist fails the whole
/// collection; one that disappears between validation and stat is logged
/// and left out.
#[instrument(skip(pool, paths), fields(paths = paths.len()))]
pub async fn collect(pool: &WorkerPool, paths: &[PathBuf], full_posix: bool, verbose: bool) -> Result<StatMap> {
    let mut validated = pin!(pool.map_ordered(paths.to_vec(), move |path| trawl_storage::validate(path, verbose)));
    let mut accepted = Vec::with_capacity(paths.len());
    while let Some(outcome) = validated.next().await {
        if let Some(path) = outcome.or_raise(|| ErrorKind::Pool)?.or_raise(|| ErrorKind::Path)? {
            accepted.push(path);
        }
    }

    let mut stats = StatMap::with_capacity(accepted.len());
    let mut entries = pin!(pool.map_ordered(accepted, |path| stat_path(path)));
    while let Some(outcome) = entries.next().await {
        match outcome.or_raise(|| ErrorKind::Pool)? {
            Ok(entry) => {
                stats.insert(identity(&entry.path, full_posix), entry);
            },
            Err(err) => tracing::warn!(error = %err, "skipping path"),
        }
    }
    Ok(stats)
}

/// Statistics over a fixed set of paths, computed on first use.
#[derive(Debug)]
pub struct MetricsCollector {
    paths: Vec<PathBuf>,
    full_posix: bool,
    verbose: bool,
    pool: WorkerPool,
    stats: OnceCell<StatMap>,
}

impl MetricsCollector {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            full_posix: false,
            verbose: false,
            pool: WorkerPool::global().clone(),
            stats: OnceCell::new(),
        }
    }

    /// Key entries by full path instead of file name.
    pub fn full_posix(mut self, full_posix: bool) -> Self {
        self.full_posix = full_posix;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// The statistics map, collected once and cached.
    pub async fn all_stats(&self) -> Result<&StatMap> {
        self.stats
            .get_or_try_init(|| collect(&self.pool, &self.paths, self.full_posix, self.verbose))
            .await
    }

    pub async fn total_files(&self) -> Result<usize> {
        Ok(self.all_stats().await?.len())
    }

    /// Combined size of every collected file; `None` when that is zero.
    pub async fn total_size(&self) -> Result<Option<HumanSize>> {
        let total = self.all_stats().await?.values().map(StatEntry::size_bytes).sum();
        Ok(bytes_to_human(total))
    }

    /// Write the statistics as pretty-printed JSON.
    ///
    /// `target` may name a file (its extension is forced to `.json`) or an
    /// existing directory to write a timestamped file into. Without a target
    /// the timestamped file lands in the working directory. An existing file
    /// is never overwritten: `_ID<n>` is appended to the stem until the name
    /// is free.
    #[instrument(skip(self, target))]
    pub async fn export(&self, target: Option<&Path>) -> Result<PathBuf> {
        let stats = self.all_stats().await?;
        let requested = match target {
            Some(dir) if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) => dir.join(default_name()?),
            Some(file) => file.with_extension(EXPORT_EXTENSION),
            None => PathBuf::from(default_name()?),
        };
        let destination = unique_path(requested).await;
        let document = serde_json::to_vec_pretty(stats).or_raise(|| ErrorKind::Serialize)?;
        tokio::fs::write(&destination, document)
            .await
            .or_raise(|| ErrorKind::Export(destination.clone()))?;
        tracing::info!(path = %destination.display(), entries = stats.len(), "exported metrics");
        Ok(destination)
    }
}

fn default_name() -> Result<String> {
    let stamp = OffsetDateTime::now_utc()
        .format(format_description!("[year][month][day]T[hour][minute][second]"))
        .or_raise(|| ErrorKind::Serialize)?;
    Ok(format!("{EXPORT_PREFIX}_{stamp}.{EXPORT_EXTENSION}"))
}

async fn unique_path(path: PathBuf) -> PathBuf {
    let exists = |p: &Path| {
        let p = p.to_path_buf();
        async move { tokio::fs::try_exists(&p).await.unwrap_or(false) }
    };
    if !exists(&path).await {
        return path;
    }
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = path.with_file_name(format!("{stem}_ID{n}.{EXPORT_EXTENSION}"));
        if !exists(&candidate).await {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn two_files(dir: &Path) -> Vec<PathBuf> {
        let a = dir.join("a.csv");
        let b = dir.join("b.txt");
        fs::write(&a, "x,y\n1,2\n").unwrap();
        fs::write(&b, vec![b'z'; 1536]).unwrap();
        vec![a, b]
    }

    #[tokio::test]
    async fn test_collect_two_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let collector = MetricsCollector::new(two_files(temp_dir.path()));
        assert_eq!(collector.total_files().await.unwrap(), 2);
        let keys: Vec<&String> = collector.all_stats().await.unwrap().keys().collect();
        assert_eq!(keys, ["a.csv", "b.txt"]);
        assert_eq!(collector.total_size().await.unwrap().unwrap().bytes, 8 + 1536);
    }

    #[tokio::test]
    async fn test_full_posix_identity() {
        let temp_dir = tempfile::tempdir().unwrap();
        let paths = two_files(temp_dir.path());
        let collector = MetricsCollector::new(paths.clone()).full_posix(true);
        let stats = collector.all_stats().await.unwrap();
        assert!(stats.contains_key(&paths[0].display().to_string()));
    }

    #[tokio::test]
    async fn test_hidden_skipped_missing_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let hidden = temp_dir.path().join("_draft.txt");
        fs::write(&hidden, "x").unwrap();
        let collector = MetricsCollector::new([hidden]);
        assert_eq!(collector.total_files().await.unwrap(), 0);

        let collector = MetricsCollector::new([temp_dir.path().join("missing.txt")]);
        let err = collector.all_stats().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Path));
    }

    #[tokio::test]
    async fn test_stats_are_cached() {
        let temp_dir = tempfile::tempdir().unwrap();
        let paths = two_files(temp_dir.path());
        let collector = MetricsCollector::new(paths.clone());
        let first = collector.all_stats().await.unwrap() as *const StatMap;
        fs::remove_file(&paths[0]).unwrap();
        let second = collector.all_stats().await.unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_export_keys_and_suffix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let collector = MetricsCollector::new(two_files(temp_dir.path()));
        let written = collector.export(Some(&temp_dir.path().join("report.txt"))).await.unwrap();
        assert_eq!(written, temp_dir.path().join("report.json"));
        let document: serde_json::Value = serde_json::from_slice(&fs::read(&written).unwrap()).unwrap();
        let keys: Vec<&String> = document.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&&"a.csv".to_string()));
        assert!(keys.contains(&&"b.txt".to_string()));

        let again = collector.export(Some(&temp_dir.path().join("report.json"))).await.unwrap();
        assert_eq!(again, temp_dir.path().join("report_ID1.json"));
    }

    #[tokio::test]
    async fn test_export_default_name_into_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let collector = MetricsCollector::new(two_files(temp_dir.path()));
        let written = collector.export(Some(out_dir.path())).await.unwrap();
        let name = written.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("metadata_stats_"));
        assert!(name.ends_with(".json"));
        assert_eq!(written.parent().unwrap(), out_dir.path());
    }
}

use moka::sync::Cache;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use trawl_integrity::{IntegrityTracker, SessionId};
use trawl_loaders::{Content, Loader, Options, Registry};

/// Memo budget in KiB of source file.
const MEMO_CAPACITY_KIB: u64 = 512 * 1024;

static MEMO: LazyLock<Cache<MemoKey, PathInfo>> = LazyLock::new(|| {
    Cache::builder()
        .weigher(|_, info: &PathInfo| memo_weight(info))
        .max_capacity(MEMO_CAPACITY_KIB)
        .build()
});

/// On-disk size in KiB, rounded up. Absent results, and files that can no
/// longer be stat'd, weigh one.
fn memo_weight(info: &PathInfo) -> u32 {
    if !info.is_present() {
        return 1;
    }
    std::fs::metadata(&info.path)
        .map(|meta| u32::try_from(meta.len().div_ceil(1024)).unwrap_or(u32::MAX).max(1))
        .unwrap_or(1)
}

/// One file and what it loaded to.
///
/// `contents` is `None` when the file failed validation or loading, or
/// turned out empty while empty results are not allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct PathInfo {
    pub path: PathBuf,
    pub contents: Option<Arc<Content>>,
}

impl PathInfo {
    pub fn absent(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), contents: None }
    }

    pub fn is_present(&self) -> bool {
        self.contents.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MemoKey {
    path: PathBuf,
    registry: u64,
    no_method: bool,
    allow_empty: bool,
    options: Options,
}

/// Everything a blocking load needs, detached from the engine so it can
/// move onto a worker thread.
#[derive(Clone)]
pub(crate) struct Dispatch {
    pub registry: Arc<Registry>,
    pub options: Options,
    pub no_method: bool,
    pub allow_empty: bool,
    pub tracker: Option<IntegrityTracker>,
    pub session: SessionId,
}

impl Dispatch {
    pub fn memo_key(&self, path: &Path) -> MemoKey {
        MemoKey {
            path: std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
            registry: self.registry.id(),
            no_method: self.no_method,
            allow_empty: self.allow_empty,
            options: self.options.clone(),
        }
    }

    /// [`load`](Self::load), remembered for the life of the process.
    pub fn load_memoized(&self, path: PathBuf) -> PathInfo {
        let key = self.memo_key(&path);
        if let Some(hit) = MEMO.get(&key) {
            tracing::debug!(path = %path.display(), "memoized load");
            return hit;
        }
        let info = self.load(path);
        MEMO.insert(key, info.clone());
        info
    }

    /// Load one file, containing every failure. Blocking.
    ///
    /// The resolved loader gets one attempt; if it errors or panics the raw
    /// fallback gets another. When both fail, or the result is empty and
    /// empties aren't allowed, the file comes back absent.
    pub fn load(&self, path: PathBuf) -> PathInfo {
        let loader = match self.no_method {
            true => Loader::RAW,
            false => self.registry.resolve_path(&path),
        };
        tracing::debug!(path = %path.display(), loader = %loader.name(), "dispatching");

        let content = match attempt(&loader, &path, &self.options) {
            Ok(content) => content,
            Err(reason) if !loader.is_raw() => {
                tracing::warn!(path = %path.display(), loader = %loader.name(), error = %reason, "loader failed, retrying with raw read");
                match attempt(&Loader::RAW, &path, &self.options) {
                    Ok(content) => content,
                    Err(reason) => {
                        tracing::warn!(path = %path.display(), error = %reason, "raw read failed, dropping file");
                        return PathInfo::absent(path);
                    },
                }
            },
            Err(reason) => {
                tracing::warn!(path = %path.display(), error = %reason, "raw read failed, dropping file");
                return PathInfo::absent(path);
            },
        };

        if content.is_empty() && !self.allow_empty {
            tracing::debug!(path = %path.display(), kind = content.kind(), "skipping empty file");
            return PathInfo::absent(path);
        }
        if let Some(tracker) = &self.tracker
            && let Err(err) = tracker.record(&self.session, &path)
        {
            tracing::warn!(path = %path.display(), error = %err, "could not record content hash");
        }
        PathInfo { path, contents: Some(Arc::new(content)) }
    }
}

fn attempt(loader: &Loader, path: &Path, options: &Options) -> Result<Content, String> {
    match catch_unwind(AssertUnwindSafe(|| loader.load(path, options))) {
        Ok(Ok(content)) => Ok(content),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err(format!("loader `{}` panicked", loader.name())),
    }
}

use crate::dispatch::{Dispatch, PathInfo};
use crate::error::{ErrorKind, Result, from_registry, from_storage};
use crate::view::{LazyView, Loaded, MapView, ResultView};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use tracing::{Span, instrument};
use trawl_asyncutils::WorkerPool;
use trawl_config::Config;
use trawl_integrity::{IntegrityTracker, SessionId};
use trawl_loaders::{CustomLoader, Registry};
use trawl_metrics::MetricsCollector;
use trawl_storage::{list_files, suffix_of, validate, validate_root};

const SINGLE_ROOT: &str = "Files";
const MULTI_ROOT: &str = "Directories";

/// Assembles a [`LoadEngine`].
///
/// Defaults: the built-in registry, the process-wide pool (or a dedicated
/// one when `workers` is configured) and, when `track_integrity` is on, the
/// process-wide hash store.
pub struct EngineBuilder {
    config: Config,
    registry: Arc<Registry>,
    overrides: Vec<(String, CustomLoader)>,
    tracker: Option<Option<IntegrityTracker>>,
    pool: Option<WorkerPool>,
}

impl EngineBuilder {
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Bind a custom loader to `extension`, with the configured loader
    /// options. Applied on top of whatever registry is in use.
    pub fn with_loader(mut self, extension: impl Into<String>, loader: CustomLoader) -> Self {
        self.overrides.push((extension.into(), loader));
        self
    }

    /// Replace the integrity tracker; `None` disables recording.
    pub fn with_tracker(mut self, tracker: Option<IntegrityTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Result<LoadEngine> {
        let Self { config, registry, overrides, tracker, pool } = self;
        config.validate().or_raise(|| ErrorKind::Configuration)?;
        let pool = match pool {
            Some(pool) => pool,
            None => WorkerPool::from_override(config.workers).or_raise(|| ErrorKind::Configuration)?,
        };
        let registry = match overrides.is_empty() {
            true => registry,
            false => Arc::new(registry.customize(overrides, &config.loader_options).map_err(from_registry)?),
        };
        let extensions = match config.default_extensions.as_deref() {
            None | Some([]) => None,
            Some(requested) => Some(registry.validate_extensions(requested).map_err(from_registry)?),
        };
        let tracker = tracker.unwrap_or_else(|| config.track_integrity.then(IntegrityTracker::global));
        let session = SessionId::next();
        tracing::debug!(session = %session, registry = registry.id(), workers = pool.size(), "engine ready");
        Ok(LoadEngine {
            inner: Arc::new(Inner {
                dispatch: Dispatch {
                    registry,
                    options: config.loader_options.clone(),
                    no_method: config.no_method,
                    allow_empty: config.allow_empty,
                    tracker,
                    session,
                },
                extensions,
                pool,
                config,
            }),
        })
    }
}

struct Inner {
    config: Config,
    dispatch: Dispatch,
    /// Normalised allow-list; `None` accepts everything.
    extensions: Option<BTreeSet<String>>,
    pool: WorkerPool,
}

/// Discovers, dispatches and shapes file loads.
///
/// Cloning is cheap; clones share configuration, registry, pool and session.
#[derive(Clone)]
pub struct LoadEngine {
    inner: Arc<Inner>,
}

impl LoadEngine {
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder { config, registry: Registry::builtin(), overrides: Vec::new(), tracker: None, pool: None }
    }

    /// An engine with every default.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.dispatch.registry
    }

    pub fn session(&self) -> &SessionId {
        &self.inner.dispatch.session
    }

    pub fn tracker(&self) -> Option<&IntegrityTracker> {
        self.inner.dispatch.tracker.as_ref()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }

    /// The allow-list in effect, `None` meaning every extension.
    pub fn extensions(&self) -> Option<&BTreeSet<String>> {
        self.inner.extensions.as_ref()
    }

    /// Same registry, pool, session and tracker, but never fans out into
    /// the configured extra directories.
    fn child(&self) -> LoadEngine {
        let mut config = self.inner.config.clone();
        config.directories.clear();
        LoadEngine {
            inner: Arc::new(Inner {
                config,
                dispatch: self.inner.dispatch.clone(),
                extensions: self.inner.extensions.clone(),
                pool: self.inner.pool.clone(),
            }),
        }
    }

    fn allowed(&self, path: &Path) -> bool {
        match &self.inner.extensions {
            None => true,
            Some(allowed) => allowed.contains(&suffix_of(path)),
        }
    }

    fn identity(&self, path: &Path) -> String {
        match (self.inner.config.full_posix, path.file_name()) {
            (false, Some(name)) => name.to_string_lossy().into_owned(),
            _ => path.display().to_string(),
        }
    }

    /// Load a single file. Memoized for the life of the process on
    /// (canonical path, registry, flags, loader options).
    ///
    /// Hidden files come back absent; directories are rejected.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn load_one(&self, path: impl AsRef<Path>) -> Result<PathInfo> {
        let requested = path.as_ref().to_path_buf();
        let Some(path) = validate(&requested, self.inner.config.verbose).map_err(|e| from_storage(e, &requested))?
        else {
            return Ok(PathInfo::absent(requested));
        };
        if path.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(path));
        }
        let dispatch = self.inner.dispatch.clone();
        self.inner.pool.run(move || dispatch.load_memoized(path)).await.or_raise(|| ErrorKind::Pool)
    }

    /// Files under `root` that would be loaded, in directory order,
    /// optionally restricted to names starting with `starts_with`.
    ///
    /// A file root is returned as-is; a hidden one yields nothing.
    #[instrument(skip(self, root), fields(root = %root.as_ref().display(), files))]
    pub async fn files(&self, root: impl AsRef<Path>, starts_with: Option<&str>) -> Result<Vec<PathBuf>> {
        let root = validate_root(root.as_ref()).map_err(|e| from_storage(e, root.as_ref()))?;
        let mut files = self.discover(root).await?;
        if let Some(prefix) = starts_with {
            files.retain(|path| path.file_name().is_some_and(|name| name.to_string_lossy().starts_with(prefix)));
        }
        Span::current().record("files", files.len());
        Ok(files)
    }

    async fn discover(&self, root: PathBuf) -> Result<Vec<PathBuf>> {
        let verbose = self.inner.config.verbose;
        if root.is_file() {
            return Ok(validate(&root, verbose).map_err(|e| from_storage(e, &root))?.into_iter().collect());
        }
        let mut candidates = Vec::new();
        let mut listing = pin!(list_files(root.clone()));
        while let Some(entry) = listing.next().await {
            match entry {
                Ok(path) if self.allowed(&path) => candidates.push(path),
                Ok(path) => tracing::trace!(path = %path.display(), "extension not allowed"),
                Err(err) => tracing::warn!(root = %root.display(), error = %err, "skipping unreadable entry"),
            }
        }
        let mut validated = pin!(self.inner.pool.map_ordered(candidates, move |path| validate(path, verbose)));
        let mut files = Vec::new();
        while let Some(outcome) = validated.next().await {
            match outcome.or_raise(|| ErrorKind::Pool)? {
                Ok(Some(path)) => files.push(path),
                Ok(None) => {},
                Err(err) => tracing::warn!(error = %err, "skipping invalid entry"),
            }
        }
        Ok(files)
    }

    /// Dispatch `files` on the pool, yielding the ones that loaded, in
    /// input order.
    fn dispatch_all(&self, files: Vec<PathBuf>) -> impl Stream<Item = Loaded> + Send + 'static {
        let dispatch = self.inner.dispatch.clone();
        let loads = self.inner.pool.map_ordered(files, move |path| dispatch.load(path));
        stream! {
            for await outcome in loads {
                match outcome {
                    Ok(PathInfo { path, contents: Some(contents) }) => {
                        yield Loaded { path, contents };
                    },
                    Ok(_) => {},
                    Err(err) => tracing::warn!(error = %err, "load task failed"),
                }
            }
        }
    }

    /// Discovery plus dispatch for one root. Runs when first polled.
    fn root_entries(&self, root: PathBuf) -> impl Stream<Item = Loaded> + Send + 'static {
        let engine = self.clone();
        stream! {
            let files = match engine.discover(root.clone()).await {
                Ok(files) => files,
                Err(err) => {
                    tracing::warn!(root = %root.display(), error = %err, "discovery failed");
                    return;
                },
            };
            tracing::debug!(root = %root.display(), files = files.len(), "discovered");
            for await loaded in engine.dispatch_all(files) {
                yield loaded;
            }
        }
    }

    /// Roots are validated up front; everything after is contained.
    fn validate_roots<I, P>(roots: I) -> Result<Vec<PathBuf>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        roots
            .into_iter()
            .map(|root| validate_root(root.as_ref()).map_err(|e| from_storage(e, root.as_ref())))
            .collect()
    }

    /// Every root through its own child engine, loaded concurrently and
    /// concatenated in root order.
    fn multi_root(&self, roots: Vec<PathBuf>) -> BoxStream<'static, Loaded> {
        let children: Vec<(LoadEngine, PathBuf)> = roots.into_iter().map(|root| (self.child(), root)).collect();
        stream::iter(children)
            .map(|(child, root)| async move { child.root_entries(root).collect::<Vec<_>>().await })
            .buffered(self.inner.pool.size())
            .flat_map(stream::iter)
            .boxed()
    }

    async fn shape(&self, name: &'static str, entries: BoxStream<'static, Loaded>) -> ResultView {
        match self.inner.config.generator {
            true => {
                let engine = self.clone();
                ResultView::Lazy(LazyView::new(name, entries.map(move |l| (engine.identity(&l.path), l)).boxed()))
            },
            false => {
                let mut view = MapView::new(name);
                let mut entries = entries;
                while let Some(loaded) = entries.next().await {
                    view.insert(self.identity(&loaded.path), loaded);
                }
                ResultView::Map(view)
            },
        }
    }

    /// Load everything under `root`, plus any configured `directories`.
    #[instrument(skip(self, root), fields(root = %root.as_ref().display()))]
    pub async fn load_all(&self, root: impl AsRef<Path>) -> Result<ResultView> {
        let extra = &self.inner.config.directories;
        if !extra.is_empty() {
            let roots = std::iter::once(root.as_ref().to_path_buf()).chain(extra.iter().cloned());
            return self.load_dirs(roots).await;
        }
        let root = validate_root(root.as_ref()).map_err(|e| from_storage(e, root.as_ref()))?;
        let entries = self.root_entries(root).boxed();
        Ok(self.shape(SINGLE_ROOT, entries).await)
    }

    /// Load several roots. On identity collisions, later roots win.
    #[instrument(skip(self, roots), fields(roots))]
    pub async fn load_dirs<I, P>(&self, roots: I) -> Result<ResultView>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = Self::validate_roots(roots)?;
        Span::current().record("roots", roots.len());
        let entries = self.multi_root(roots);
        Ok(self.shape(MULTI_ROOT, entries).await)
    }

    /// Load an explicit list of files. Entries that fail validation are
    /// logged and skipped.
    #[instrument(skip(self, paths), fields(files))]
    pub async fn load_files<I, P>(&self, paths: I) -> Result<ResultView>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let verbose = self.inner.config.verbose;
        let accepted: Vec<PathBuf> = paths
            .into_iter()
            .filter_map(|path| match validate(path.as_ref(), verbose) {
                Ok(Some(path)) if path.is_file() => Some(path),
                Ok(Some(path)) => {
                    tracing::warn!(path = %path.display(), "not a file, skipping");
                    None
                },
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(path = %path.as_ref().display(), error = %err, "skipping invalid file");
                    None
                },
            })
            .collect();
        Span::current().record("files", accepted.len());
        let entries = self.dispatch_all(accepted).boxed();
        Ok(self.shape(SINGLE_ROOT, entries).await)
    }

    /// A metrics collector over `paths`, sharing this engine's pool and the
    /// configured metrics options.
    pub fn metrics<I, P>(&self, paths: I) -> MetricsCollector
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        MetricsCollector::new(paths)
            .full_posix(self.inner.config.metrics.full_posix)
            .verbose(self.inner.config.verbose)
            .with_pool(self.inner.pool.clone())
    }

    /// Export metrics for `paths` to the configured export name, or a
    /// timestamped file in the working directory.
    pub async fn export_metrics<I, P>(&self, paths: I) -> trawl_metrics::error::Result<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let target = self.inner.config.metrics.export_name.clone();
        self.metrics(paths).export(target.as_deref()).await
    }
}

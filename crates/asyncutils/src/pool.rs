use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::{Stream, StreamExt, stream};
use std::sync::{Arc, OnceLock};
use std::thread::available_parallelism;
use tokio::sync::Semaphore;

const MAX_DEFAULT_WORKERS: usize = 32;
const EXTRA_WORKERS: usize = 4;

static GLOBAL: OnceLock<WorkerPool> = OnceLock::new();

/// Default pool size: `min(32, cores + 4)`.
///
/// File loading is I/O bound, so the pool is deliberately larger than the
/// number of cores; the cap keeps machines with huge core counts from
/// opening hundreds of files at once.
pub fn default_size() -> usize {
    let cores = available_parallelism().map(|n| n.get()).unwrap_or(1);
    MAX_DEFAULT_WORKERS.min(cores + EXTRA_WORKERS)
}

/// A semaphore-bounded handle onto Tokio's blocking thread pool.
///
/// Cloning is cheap and clones share the same permits.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Build a dedicated pool with `size` slots.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            exn::bail!(ErrorKind::InvalidSize(size));
        }
        Ok(Self::with_size(size))
    }

    fn with_size(size: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(size)), size }
    }

    /// The process-wide pool, built on first access.
    ///
    /// Concurrent first calls race on a [`OnceLock`], so exactly one pool is
    /// ever constructed.
    pub fn global() -> &'static WorkerPool {
        GLOBAL.get_or_init(|| {
            let size = default_size();
            tracing::debug!(size, "initialising process-wide worker pool");
            Self::with_size(size)
        })
    }

    /// Resolve a pool from an optional worker-count override.
    pub fn from_override(workers: Option<usize>) -> Result<Self> {
        match workers {
            Some(size) => Self::new(size),
            None => Ok(Self::global().clone()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of slots not currently held by a running task.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one blocking closure once a slot is free.
    ///
    /// A panic inside `task` is reported as [`ErrorKind::Task`] rather than
    /// unwinding into the caller.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits).acquire_owned().await.or_raise(|| ErrorKind::Closed)?;
        tracing::trace!(available = self.permits.available_permits(), "worker slot acquired");
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        })
        .await
        .or_raise(|| ErrorKind::Task)
    }

    /// Apply `task` to every item on the pool, yielding results in input order.
    ///
    /// At most [`size`](Self::size) tasks run at once. Items are not pulled
    /// from `items` until the stream is polled, so an unconsumed stream does
    /// no work.
    pub fn map_ordered<I, F, T>(&self, items: I, task: F) -> impl Stream<Item = Result<T>> + Send + 'static
    where
        I: IntoIterator,
        I::IntoIter: Send + 'static,
        I::Item: Send + 'static,
        F: Fn(I::Item) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        let pool = self.clone();
        let task = Arc::new(task);
        stream::iter(items)
            .map(move |item| {
                let pool = pool.clone();
                let task = Arc::clone(&task);
                async move { pool.run(move || task(item)).await }
            })
            .buffered(self.size)
    }
}

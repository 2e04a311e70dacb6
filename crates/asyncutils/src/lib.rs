//! Bounded dispatch of blocking filesystem work onto Tokio's blocking pool.
//!
//! Every load, stat and validation batch in trawl goes through a
//! [`WorkerPool`]. The pool itself owns no threads: it is a semaphore that
//! caps how many [`spawn_blocking`](tokio::task::spawn_blocking) tasks may be
//! in flight at once, so a directory of ten thousand files never turns into
//! ten thousand concurrent `open()` calls.
//!
//! [`WorkerPool::map_ordered`] is the workhorse: results come back in the
//! order the inputs were handed in, regardless of which task finished first.

pub mod error;
mod pool;

pub use crate::pool::{WorkerPool, default_size};

//! The load engine.
//!
//! [`LoadEngine`] discovers the immediate files of a root, filters them by
//! extension, and dispatches each to its registered loader on the shared
//! worker pool. A failing loader never takes the batch down with it: the
//! file is retried with the raw read, and dropped only if that fails too.
//! Results come back as a [`ResultView`], either an ordered [`MapView`] or
//! a single-pass [`LazyView`].

mod dispatch;
mod engine;
pub mod error;
mod view;

pub use crate::dispatch::PathInfo;
pub use crate::engine::{EngineBuilder, LoadEngine};
pub use crate::view::{Exhausted, LazyView, Loaded, Lookup, MapView, ResultView};

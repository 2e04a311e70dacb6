//! Concurrent directory ingestion.
//!
//! Point a [`LoadEngine`] at a directory and every immediate file is loaded
//! through the loader registered for its extension, on a bounded worker
//! pool, with content hashes recorded on the side. See the member crates for
//! the individual pieces.

pub use trawl_asyncutils::{WorkerPool, default_size};
pub use trawl_config::{Config, MetricsConfig};
pub use trawl_engine::{EngineBuilder, Exhausted, LazyView, LoadEngine, Loaded, Lookup, MapView, PathInfo, ResultView};
pub use trawl_integrity::{HashStore, IntegrityTracker, MemoryHashStore, SessionId, Verification};
pub use trawl_loaders::{Content, CustomLoader, Loader, Options, Registry};
pub use trawl_metrics::{HumanSize, MetricsCollector, bytes_to_human};

pub mod error {
    //! Error types of every layer, by crate.
    pub use trawl_config::error as config;
    pub use trawl_engine::error as engine;
    pub use trawl_integrity::error as integrity;
    pub use trawl_loaders::error as loaders;
    pub use trawl_metrics::error as metrics;
    pub use trawl_storage::error as storage;
}

//! File and volume statistics.
//!
//! [`MetricsCollector`] stats a set of paths on the shared worker pool,
//! converts every numeric attribute with [`bytes_to_human`], snapshots the
//! usage of the volume each path lives on, and can export the lot as JSON.

mod collector;
pub mod error;
mod stats;
mod units;

pub use crate::collector::{MetricsCollector, StatMap, collect};
pub use crate::stats::{StatEntry, VolumeUsage, stat_path};
pub use crate::units::{HumanSize, Unit, bytes_to_human};

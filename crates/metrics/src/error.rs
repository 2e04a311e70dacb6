//! Metrics Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A metrics error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metrics operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// One of the requested paths failed validation.
    #[display("invalid metrics path")]
    Path,
    /// Reading metadata failed.
    #[display("could not stat {}", _0.display())]
    Stat(#[error(not(source))] PathBuf),
    /// The worker pool could not run a task.
    #[display("worker pool failure")]
    Pool,
    #[display("could not serialize metrics")]
    Serialize,
    #[display("could not write metrics to {}", _0.display())]
    Export(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stat(_) | Self::Pool | Self::Export(_))
    }
}

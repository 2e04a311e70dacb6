//! Worker Pool Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A worker pool error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for worker pool operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A pool cannot be built without at least one worker.
    #[display("invalid worker count: {_0}")]
    InvalidSize(#[error(not(source))] usize),
    /// The pool's semaphore was closed while waiting for a slot.
    #[display("worker pool closed")]
    Closed,
    /// The blocking task panicked or was cancelled by runtime shutdown.
    #[display("worker task did not complete")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidSize(0).to_string(), "invalid worker count: 0");
        assert_eq!(ErrorKind::Closed.to_string(), "worker pool closed");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Task.is_retryable());
        assert!(!ErrorKind::Closed.is_retryable());
        assert!(!ErrorKind::InvalidSize(0).is_retryable());
    }
}

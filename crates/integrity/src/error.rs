//! Integrity Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An integrity error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for integrity operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// File could not be opened or read while hashing.
    #[display("could not read {} for hashing", _0.display())]
    Unreadable(#[error(not(source))] PathBuf),
    /// A record exists for the file but it can no longer be verified.
    #[display("integrity check failed for {}", _0.display())]
    Integrity(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreadable(_))
    }
}

//! Engine Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only failures that abort a whole call surface here. Problems with an
//! individual discovered file are logged and contained by the engine.

use derive_more::{Display, Error};
use std::path::PathBuf;
use trawl_loaders::error::ExtensionRejection;
use trawl_storage::error::ErrorKind as StorageErrorKind;

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("path not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Exists, but isn't something this call can load.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Every requested extension was unknown.
    #[display("{_0}")]
    Extension(#[error(not(source))] ExtensionRejection),
    #[display("invalid configuration")]
    Configuration,
    #[display("invalid loader override")]
    Override,
    #[display("could not list {}", _0.display())]
    Discovery(#[error(not(source))] PathBuf),
    #[display("worker pool failure")]
    Pool,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Discovery(_) | Self::Pool)
    }
}

/// Re-raise a storage error under the matching engine kind.
pub(crate) fn from_storage(err: trawl_storage::error::Error, path: impl Into<PathBuf>) -> Error {
    let kind = match &*err {
        StorageErrorKind::NotFound(p) => ErrorKind::NotFound(p.clone()),
        StorageErrorKind::InvalidPath(p) => ErrorKind::InvalidPath(p.clone()),
        StorageErrorKind::PermissionDenied(p) => ErrorKind::PermissionDenied(p.clone()),
        StorageErrorKind::Io(_) => ErrorKind::Discovery(path.into()),
    };
    err.raise(kind)
}

/// Re-raise a registry error; an all-invalid allow-list keeps its details.
pub(crate) fn from_registry(err: trawl_loaders::error::Error) -> Error {
    let kind = match &*err {
        trawl_loaders::error::ErrorKind::Extension(rejection) => ErrorKind::Extension(rejection.clone()),
        _ => ErrorKind::Override,
    };
    err.raise(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawl_loaders::error::ErrorKind as LoaderErrorKind;

    #[test]
    fn test_storage_kinds_carry_the_path() {
        let err = from_storage(exn::Exn::from(StorageErrorKind::NotFound(PathBuf::from("/x"))), "/x");
        assert_eq!(&*err, &ErrorKind::NotFound(PathBuf::from("/x")));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_extension_rejection_survives() {
        let rejection = ExtensionRejection { invalid: vec!["zzz".into()], suggestion: None };
        let err = from_registry(exn::Exn::from(LoaderErrorKind::Extension(rejection.clone())));
        assert_eq!(&*err, &ErrorKind::Extension(rejection));
        let err = from_registry(exn::Exn::from(LoaderErrorKind::Validation("bad".into())));
        assert_eq!(&*err, &ErrorKind::Override);
    }
}

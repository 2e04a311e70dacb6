//! Loader Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Everything a loader raises is a load failure the engine contains: it is
//! logged, the file is retried with the raw fallback, and only then dropped.
//! [`ErrorKind::Validation`] and [`ErrorKind::Extension`] are the exceptions;
//! they come from registry configuration and are fatal to the caller.

use derive_more::{Display, Error};
use std::fmt::{Display as FmtDisplay, Formatter, Result as FmtResult};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A loader error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for loader and registry operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Bytes are not valid UTF-8 and lossy decoding was not requested.
    #[display("not valid UTF-8: {}", _0.display())]
    Decode(#[error(not(source))] PathBuf),
    /// The file does not parse as the format its extension claims.
    #[display("malformed {_0} data")]
    Malformed(#[error(not(source))] &'static str),
    /// Format is recognised but support for it is compiled out.
    #[display("unsupported format: {_0}")]
    Unsupported(#[error(not(source))] String),
    /// A loader option or override binding is unusable.
    #[display("validation error: {_0}")]
    Validation(#[error(not(source))] String),
    /// None of the requested extensions are known to the registry.
    #[display("{_0}")]
    Extension(#[error(not(source))] ExtensionRejection),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    pub fn from_io(err: IoError, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// The offending extensions, plus the closest known one when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRejection {
    pub invalid: Vec<String>,
    pub suggestion: Option<String>,
}

impl FmtDisplay for ExtensionRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "none of the requested extensions are supported: {}", self.invalid.join(", "))?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean `{suggestion}`?)")?;
        }
        Ok(())
    }
}

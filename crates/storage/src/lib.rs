//! Filesystem groundwork for trawl: deciding which paths are worth loading
//! and finding them.
//!
//! - [`validate`] / [`validate_root`] check existence and kind, and flag
//!   "hidden" entries (stems starting with `.` or `_`) as skippable.
//! - [`list_files`] streams the immediate child files of a directory in
//!   the order the filesystem returns them.

pub mod error;
mod listing;
mod path;

pub use crate::listing::list_files;
pub use crate::path::{is_hidden, normalize, normalize_suffix, suffix_of, validate, validate_root};

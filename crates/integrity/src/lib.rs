//! Content-integrity tracking.
//!
//! [`IntegrityTracker::record`] hashes a file (BLAKE3, read in fixed-size
//! chunks) and appends the digest to a [`HashStore`] under a [`SessionId`];
//! [`IntegrityTracker::verify`] re-hashes later and compares against the
//! most recent record.
//!
//! The store is injected. [`MemoryHashStore::global`] is the process-wide
//! default and is what the load engine records into unless told otherwise.

pub mod error;
mod hash;
mod store;
mod tracker;

pub use crate::hash::{CHUNK_SIZE, hash_file};
pub use crate::store::{HashEntry, HashRecord, HashStore, MemoryHashStore, SessionId};
pub use crate::tracker::{IntegrityTracker, Verification};

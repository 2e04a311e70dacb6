use crate::error::{ErrorKind, Result};
use crate::hash::hash_file;
use crate::store::{HashEntry, HashStore, MemoryHashStore, SessionId};
use exn::ResultExt;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// Outcome of re-hashing a file against its last record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Tampered { path: PathBuf, expected: String, actual: String },
    /// Never hashed. Not an error; `current` is the hash as of now, if the
    /// file could be read.
    Unrecorded { path: PathBuf, current: Option<String> },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl Display for Verification {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Verified => f.write_str("verified"),
            Self::Tampered { path, expected, actual } => {
                write!(f, "{} has changed: expected {expected}, found {actual}", path.display())
            },
            Self::Unrecorded { path, current: Some(hash) } => {
                write!(f, "{} has no matches to compare to.\nCurrent hash value:\n{hash}", path.display())
            },
            Self::Unrecorded { path, current: None } => {
                write!(f, "{} has no matches to compare to and cannot be read", path.display())
            },
        }
    }
}

/// Records are keyed by canonical parent directory plus file name, so
/// relative and symlinked spellings of the same file meet, and a key can
/// still be rebuilt once the file itself is gone.
fn key_for(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent).ok().map(|dir| dir.join(name)),
        _ => std::fs::canonicalize(&absolute).ok(),
    };
    resolved.unwrap_or(absolute)
}

#[derive(Clone)]
pub struct IntegrityTracker {
    store: Arc<dyn HashStore>,
}

impl IntegrityTracker {
    pub fn new(store: Arc<dyn HashStore>) -> Self {
        Self { store }
    }

    /// A tracker over the process-wide [`MemoryHashStore`].
    pub fn global() -> Self {
        Self::new(MemoryHashStore::global())
    }

    pub fn store(&self) -> &Arc<dyn HashStore> {
        &self.store
    }

    /// Hash `path` and append the digest under `session`.
    #[instrument(skip(self, session, path), fields(session = %session, path = %path.as_ref().display()))]
    pub fn record(&self, session: &SessionId, path: impl AsRef<Path>) -> Result<String> {
        let key = key_for(path.as_ref());
        let hash = hash_file(&key)?;
        self.store.append(session, HashEntry { path: key, hash: hash.clone() });
        Ok(hash)
    }

    /// Re-hash `path` and compare against its latest record, across all
    /// sessions unless one is given.
    #[instrument(skip(self, path, session), fields(path = %path.as_ref().display()))]
    pub fn verify(&self, path: impl AsRef<Path>, session: Option<&SessionId>) -> Result<Verification> {
        let key = key_for(path.as_ref());
        let Some(recorded) = self.store.lookup(&key, session) else {
            let current = hash_file(&key).ok();
            return Ok(Verification::Unrecorded { path: key, current });
        };
        let actual = hash_file(&key).or_raise(|| ErrorKind::Integrity(key.clone()))?;
        if actual == recorded.hash {
            return Ok(Verification::Verified);
        }
        tracing::warn!(path = %key.display(), "content hash mismatch");
        Ok(Verification::Tampered { path: key, expected: recorded.hash, actual })
    }

    /// Verify every path recorded (in `session`, or anywhere). `true` only
    /// if none changed.
    pub fn verify_all(&self, session: Option<&SessionId>) -> Result<bool> {
        let sessions = match session {
            Some(id) => vec![id.clone()],
            None => self.store.sessions(),
        };
        let paths: BTreeSet<PathBuf> = sessions
            .iter()
            .filter_map(|id| self.store.record(id))
            .flat_map(|record| record.entries.into_iter().map(|e| e.path))
            .collect();
        let mut all_verified = true;
        for path in paths {
            all_verified &= self.verify(&path, session)?.is_verified();
        }
        Ok(all_verified)
    }
}

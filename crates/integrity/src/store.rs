use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);
static GLOBAL: LazyLock<Arc<MemoryHashStore>> = LazyLock::new(|| Arc::new(MemoryHashStore::default()));

/// Groups the records written by one engine's run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// A process-unique id: `session-1`, `session-2`, ...
    pub fn next() -> Self {
        Self(format!("session-{}", NEXT_SESSION.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    pub path: PathBuf,
    pub hash: String,
}

/// Everything recorded under one session, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub session: SessionId,
    pub entries: Vec<HashEntry>,
}

/// Append-only storage for hash records.
pub trait HashStore: Send + Sync {
    fn append(&self, session: &SessionId, entry: HashEntry);
    /// The most recently appended entry for `path`, optionally restricted
    /// to one session.
    fn lookup(&self, path: &Path, session: Option<&SessionId>) -> Option<HashEntry>;
    fn record(&self, session: &SessionId) -> Option<HashRecord>;
    fn sessions(&self) -> Vec<SessionId>;
    fn clear(&self);
}

/// In-process [`HashStore`].
///
/// Each entry carries a global sequence number so "most recent" holds
/// across sessions, not just within one.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    sequence: AtomicU64,
    sessions: RwLock<IndexMap<SessionId, Vec<(u64, HashEntry)>>>,
}

impl MemoryHashStore {
    /// The process-wide store.
    pub fn global() -> Arc<MemoryHashStore> {
        Arc::clone(&GLOBAL)
    }
}

impl HashStore for MemoryHashStore {
    fn append(&self, session: &SessionId, entry: HashEntry) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().entry(session.clone()).or_default().push((seq, entry));
    }

    fn lookup(&self, path: &Path, session: Option<&SessionId>) -> Option<HashEntry> {
        let sessions = self.sessions.read();
        let scoped: Box<dyn Iterator<Item = &Vec<(u64, HashEntry)>>> = match session {
            Some(id) => Box::new(sessions.get(id).into_iter()),
            None => Box::new(sessions.values()),
        };
        scoped
            .flatten()
            .filter(|(_, entry)| entry.path == path)
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, entry)| entry.clone())
    }

    fn record(&self, session: &SessionId) -> Option<HashRecord> {
        self.sessions.read().get(session).map(|entries| HashRecord {
            session: session.clone(),
            entries: entries.iter().map(|(_, entry)| entry.clone()).collect(),
        })
    }

    fn sessions(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    fn clear(&self) {
        self.sessions.write().clear();
    }
}

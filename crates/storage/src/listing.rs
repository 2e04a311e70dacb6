//! Non-recursive directory discovery.

use crate::error::{ErrorKind, Result};
use async_stream::stream;
use futures::Stream;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum ChildEntry {
    File(PathBuf),
    Directory(PathBuf),
    Other(PathBuf),
}

/// Follows symlinks, so a link to a regular file counts as a file.
async fn classify(entry: DirEntry) -> Result<ChildEntry> {
    let path = entry.path();
    let metadata = fs::metadata(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?;
    Ok(match metadata {
        m if m.is_file() => ChildEntry::File(path),
        m if m.is_dir() => ChildEntry::Directory(path),
        _ => ChildEntry::Other(path),
    })
}

/// Stream the immediate child files of `root`.
///
/// Order is whatever the filesystem hands back; nothing is sorted. Failing
/// to open `root` ends the stream after a single error, while a failure on
/// one child is yielded and the listing carries on.
pub fn list_files(root: impl AsRef<Path>) -> impl Stream<Item = Result<PathBuf>> + Send + 'static {
    let root = root.as_ref().to_path_buf();
    stream! {
        let mut entries = match fs::read_dir(&root).await {
            Ok(entries) => entries,
            Err(e) => {
                yield Err(exn::Exn::from(ErrorKind::from_io(e, &root)));
                return;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    yield Err(exn::Exn::from(ErrorKind::from_io(e, &root)));
                    break;
                },
            };
            match classify(entry).await {
                Ok(ChildEntry::File(path)) => yield Ok(path),
                Ok(ChildEntry::Directory(path)) => tracing::trace!(path = %path.display(), "not descending into directory"),
                Ok(ChildEntry::Other(path)) => tracing::debug!(path = %path.display(), "skipping special file"),
                // Most likely a broken symlink.
                Err(e) => yield Err(e),
            }
        }
    }
}

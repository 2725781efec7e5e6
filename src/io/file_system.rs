//! File-system boundary
//!
//! The cache is a pure consumer of file content: it opens, reads, and
//! stats, but never writes. [`FileSystem`] abstracts that boundary so tests
//! can substitute [`InMemoryFileSystem`] instead of touching real disk.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::depval::{FileSnapshot, FileSnapshotState};
use crate::error::{AssetError, AssetResult};

/// Normalizes a path the same way for every producer, so two spellings of
/// the same file dedup to one dependency-validation leaf.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Read access to tracked files, plus the snapshot metadata the
/// dependency-validation registry needs.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read the full contents of `path`.
    async fn read(&self, path: &str) -> AssetResult<Vec<u8>>;

    /// Stat `path` without reading it, returning a snapshot suitable for
    /// registering with the dependency-validation registry.
    async fn snapshot(&self, path: &str) -> FileSnapshot;
}

/// `tokio::fs`-backed implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

#[async_trait]
impl FileSystem for StdFileSystem {
    async fn read(&self, path: &str) -> AssetResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| AssetError::Retrieval(format!("reading '{path}': {e}")))
    }

    async fn snapshot(&self, path: &str) -> FileSnapshot {
        let normalized = normalize_path(path);
        match tokio::fs::metadata(path).await {
            Ok(meta) => {
                let marker = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                FileSnapshot {
                    path: normalized,
                    state: FileSnapshotState::Normal,
                    marker,
                }
            }
            Err(_) => FileSnapshot {
                path: normalized,
                state: FileSnapshotState::Missing,
                marker: 0,
            },
        }
    }
}

/// An in-memory stand-in for tests: content and mtimes are set directly
/// rather than touched on disk.
#[derive(Default)]
pub struct InMemoryFileSystem {
    files: RwLock<HashMap<String, (Vec<u8>, u64)>>,
}

impl InMemoryFileSystem {
    /// Build an empty in-memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file's content, bumping its marker.
    pub fn put(&self, path: &str, content: impl Into<Vec<u8>>) {
        let normalized = normalize_path(path);
        let mut files = self.files.write();
        let marker = files.get(&normalized).map(|(_, m)| m + 1).unwrap_or(1);
        files.insert(normalized, (content.into(), marker));
    }

    /// Remove a file, simulating deletion.
    pub fn remove(&self, path: &str) {
        self.files.write().remove(&normalize_path(path));
    }
}

#[async_trait]
impl FileSystem for InMemoryFileSystem {
    async fn read(&self, path: &str) -> AssetResult<Vec<u8>> {
        self.files
            .read()
            .get(&normalize_path(path))
            .map(|(content, _)| content.clone())
            .ok_or_else(|| AssetError::Retrieval(format!("no such in-memory file '{path}'")))
    }

    async fn snapshot(&self, path: &str) -> FileSnapshot {
        let normalized = normalize_path(path);
        match self.files.read().get(&normalized) {
            Some((_, marker)) => FileSnapshot {
                path: normalized,
                state: FileSnapshotState::Normal,
                marker: *marker,
            },
            None => FileSnapshot {
                path: normalized,
                state: FileSnapshotState::Missing,
                marker: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips_content() {
        let fs = InMemoryFileSystem::new();
        fs.put("a/b.txt", b"hello".to_vec());
        assert_eq!(fs.read("a/b.txt").await.unwrap(), b"hello");
        assert_eq!(fs.snapshot("a/b.txt").await.state, FileSnapshotState::Normal);
    }

    #[tokio::test]
    async fn missing_file_reports_missing_state() {
        let fs = InMemoryFileSystem::new();
        assert_eq!(fs.snapshot("nope.txt").await.state, FileSnapshotState::Missing);
        assert!(fs.read("nope.txt").await.is_err());
    }

    #[tokio::test]
    async fn put_bumps_marker_on_overwrite() {
        let fs = InMemoryFileSystem::new();
        fs.put("a.txt", b"v1".to_vec());
        let first = fs.snapshot("a.txt").await.marker;
        fs.put("a.txt", b"v2".to_vec());
        let second = fs.snapshot("a.txt").await.marker;
        assert!(second > first);
    }
}

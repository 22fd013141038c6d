//! # Storage Backend Trait

use chrono::{DateTime, Utc};

use super::errors::FileStorageResult;
use super::path::WsPath;

/// File content plus the timestamps a provider maintains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
}

impl StoredFile {
    /// A fresh file created now
    pub fn new(content: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            content,
            ctime: now,
            mtime: now,
        }
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Raw storage under a file provider.
///
/// Backends do not check preconditions; [`super::FileStorage`] does that
/// and serializes mutations.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Short backend name used in errors and logs
    fn name(&self) -> &'static str;

    /// Write a file, replacing any previous content
    fn write(&self, path: &WsPath, file: &StoredFile) -> FileStorageResult<()>;

    /// Read a file, `None` if absent
    fn read(&self, path: &WsPath) -> FileStorageResult<Option<StoredFile>>;

    /// Delete a file. Absent files are not an error.
    fn delete(&self, path: &WsPath) -> FileStorageResult<()>;

    /// Move a file within one workspace
    fn rename(&self, from: &WsPath, to: &WsPath) -> FileStorageResult<()>;

    /// Check if path exists
    fn exists(&self, path: &WsPath) -> FileStorageResult<bool>;

    /// All files in a workspace, any order
    fn list(&self, ws_name: &str) -> FileStorageResult<Vec<WsPath>>;
}

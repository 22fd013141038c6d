//! # In-Memory Backend

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::backend::{StorageBackend, StoredFile};
use super::errors::{FileStorageError, FileStorageResult};
use super::path::WsPath;

/// Volatile backend for memory workspaces and tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: RwLock<BTreeMap<WsPath, StoredFile>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files across all workspaces
    pub fn len(&self) -> usize {
        self.files.read().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> FileStorageError {
    FileStorageError::Internal("Lock poisoned".into())
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn write(&self, path: &WsPath, file: &StoredFile) -> FileStorageResult<()> {
        let mut files = self.files.write().map_err(|_| poisoned())?;
        files.insert(path.clone(), file.clone());
        Ok(())
    }

    fn read(&self, path: &WsPath) -> FileStorageResult<Option<StoredFile>> {
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files.get(path).cloned())
    }

    fn delete(&self, path: &WsPath) -> FileStorageResult<()> {
        let mut files = self.files.write().map_err(|_| poisoned())?;
        files.remove(path);
        Ok(())
    }

    fn rename(&self, from: &WsPath, to: &WsPath) -> FileStorageResult<()> {
        let mut files = self.files.write().map_err(|_| poisoned())?;
        let file = files
            .remove(from)
            .ok_or_else(|| FileStorageError::FileNotFound(from.to_string()))?;
        files.insert(to.clone(), file);
        Ok(())
    }

    fn exists(&self, path: &WsPath) -> FileStorageResult<bool> {
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files.contains_key(path))
    }

    fn list(&self, ws_name: &str) -> FileStorageResult<Vec<WsPath>> {
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files
            .keys()
            .filter(|path| path.ws_name() == ws_name)
            .cloned()
            .collect())
    }
}

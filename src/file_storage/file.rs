//! # File Operations
//!
//! [`FileStorageProvider`] is the contract every workspace storage honors.
//! [`FileStorage`] implements it over any [`StorageBackend`], checking
//! preconditions and emitting change events after the backing write.

use std::fmt;
use std::sync::Mutex;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::backend::{StorageBackend, StoredFile};
use super::errors::{FileStorageError, FileStorageResult};
use super::events::{FileChangeCallback, FileChangeEvent};
use super::path::WsPath;
use crate::observability::{log_event_with_fields, Event};

/// Operations a workspace needs from its storage
pub trait FileStorageProvider: Send + Sync + fmt::Debug {
    /// Provider name, used in wrapped errors
    fn name(&self) -> &'static str;

    /// Create a new file. Fails if one already exists at `path`.
    fn create_file(&self, path: &WsPath, content: &[u8]) -> FileStorageResult<()>;

    /// Overwrite an existing file, keeping its ctime
    fn write_file(&self, path: &WsPath, content: &[u8]) -> FileStorageResult<()>;

    /// Read a file, `None` if absent
    fn read_file(&self, path: &WsPath) -> FileStorageResult<Option<StoredFile>>;

    /// Delete a file. Deleting an absent file succeeds and emits nothing.
    fn delete_file(&self, path: &WsPath) -> FileStorageResult<()>;

    /// Move a file within its workspace
    fn rename_file(&self, old_path: &WsPath, new_path: &WsPath) -> FileStorageResult<()>;

    /// Every file of a workspace, sorted
    fn list_all_files(&self, ws_name: &str, cancel: &CancellationToken) -> FileStorageResult<Vec<WsPath>>;

    fn file_exists(&self, path: &WsPath) -> FileStorageResult<bool>;
}

/// File provider over a storage backend
pub struct FileStorage<B: StorageBackend> {
    backend: B,
    on_change: Option<FileChangeCallback>,
    // Held across check-then-write so preconditions stay valid
    mutation: Mutex<()>,
}

impl<B: StorageBackend> fmt::Debug for FileStorage<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("backend", &self.backend)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl<B: StorageBackend> FileStorage<B> {
    /// Create a new file provider
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            on_change: None,
            mutation: Mutex::new(()),
        }
    }

    /// Report every successful mutation to `callback`
    pub fn with_on_change(mut self, callback: FileChangeCallback) -> Self {
        self.on_change = Some(callback);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn lock(&self) -> FileStorageResult<std::sync::MutexGuard<'_, ()>> {
        self.mutation
            .lock()
            .map_err(|_| FileStorageError::Internal("Lock poisoned".into()))
    }

    fn emit(&self, event: FileChangeEvent) {
        if let Some(callback) = &self.on_change {
            callback(&event);
        }
    }
}

impl<B: StorageBackend> FileStorageProvider for FileStorage<B> {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn create_file(&self, path: &WsPath, content: &[u8]) -> FileStorageResult<()> {
        {
            let _guard = self.lock()?;
            if self.backend.exists(path)? {
                return Err(FileStorageError::FileAlreadyExists(path.to_string()));
            }
            self.backend.write(path, &StoredFile::new(content.to_vec()))?;
        }

        self.emit(FileChangeEvent::Create { ws_path: path.clone() });
        Ok(())
    }

    fn write_file(&self, path: &WsPath, content: &[u8]) -> FileStorageResult<()> {
        {
            let _guard = self.lock()?;
            let existing = self
                .backend
                .read(path)?
                .ok_or_else(|| FileStorageError::FileNotFound(path.to_string()))?;

            let file = StoredFile {
                content: content.to_vec(),
                ctime: existing.ctime,
                mtime: Utc::now(),
            };
            self.backend.write(path, &file)?;
        }

        self.emit(FileChangeEvent::Update { ws_path: path.clone() });
        Ok(())
    }

    fn read_file(&self, path: &WsPath) -> FileStorageResult<Option<StoredFile>> {
        self.backend.read(path)
    }

    fn delete_file(&self, path: &WsPath) -> FileStorageResult<()> {
        {
            let _guard = self.lock()?;
            if !self.backend.exists(path)? {
                return Ok(());
            }
            self.backend.delete(path)?;
        }

        self.emit(FileChangeEvent::Delete { ws_path: path.clone() });
        Ok(())
    }

    fn rename_file(&self, old_path: &WsPath, new_path: &WsPath) -> FileStorageResult<()> {
        if !old_path.same_workspace(new_path) {
            return Err(FileStorageError::CrossWorkspaceRename {
                from: old_path.to_string(),
                to: new_path.to_string(),
            });
        }

        {
            let _guard = self.lock()?;
            if !self.backend.exists(old_path)? {
                return Err(FileStorageError::FileNotFound(old_path.to_string()));
            }
            if self.backend.exists(new_path)? {
                return Err(FileStorageError::FileAlreadyExists(new_path.to_string()));
            }
            self.backend.rename(old_path, new_path)?;
        }

        log_event_with_fields(
            Event::FileRenamed,
            &[("from", old_path.as_str()), ("to", new_path.as_str())],
        );
        self.emit(FileChangeEvent::Rename {
            old_ws_path: old_path.clone(),
            new_ws_path: new_path.clone(),
        });
        Ok(())
    }

    fn list_all_files(&self, ws_name: &str, cancel: &CancellationToken) -> FileStorageResult<Vec<WsPath>> {
        if cancel.is_cancelled() {
            return Err(FileStorageError::Aborted);
        }

        let mut files = self.backend.list(ws_name)?;

        if cancel.is_cancelled() {
            return Err(FileStorageError::Aborted);
        }
        files.sort();
        Ok(files)
    }

    fn file_exists(&self, path: &WsPath) -> FileStorageResult<bool> {
        self.backend.exists(path)
    }
}

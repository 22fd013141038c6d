//! # Disk Hash Readers

use std::fmt;

use super::sha::calculate_git_file_sha;
use crate::file_storage::{FileStorage, FileStorageError, FileStorageProvider, FileStorageResult, StorageBackend, WsPath};
use crate::workspace::{WorkspaceError, WorkspaceManager};

/// Source of the current on-disk hash of a file
pub trait DiskShaReader: Send + Sync + fmt::Debug {
    /// Hash of the stored content, `None` if the file is gone
    fn read_disk_sha(&self, path: &WsPath) -> FileStorageResult<Option<String>>;
}

impl<B: StorageBackend> DiskShaReader for FileStorage<B> {
    fn read_disk_sha(&self, path: &WsPath) -> FileStorageResult<Option<String>> {
        Ok(self
            .read_file(path)?
            .map(|file| calculate_git_file_sha(&file.content)))
    }
}

/// Resolves the workspace of each path. Files of deleted workspaces read as gone.
impl DiskShaReader for WorkspaceManager {
    fn read_disk_sha(&self, path: &WsPath) -> FileStorageResult<Option<String>> {
        let workspace = match self.open_workspace(path.ws_name()) {
            Ok(Some(workspace)) => workspace,
            Ok(None) => return Ok(None),
            Err(e) => return Err(unwrap_storage(e)),
        };

        let file = workspace.read_file(path).map_err(unwrap_storage)?;
        Ok(file.map(|file| calculate_git_file_sha(&file.content)))
    }
}

fn unwrap_storage(err: WorkspaceError) -> FileStorageError {
    match err {
        WorkspaceError::Storage { source, .. } => source,
        other => FileStorageError::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_storage::MemoryBackend;

    #[test]
    fn test_storage_reader() {
        let storage = FileStorage::new(MemoryBackend::new());
        let path = WsPath::parse("ws:a.md").unwrap();

        assert_eq!(storage.read_disk_sha(&path).unwrap(), None);

        storage.create_file(&path, b"hello").unwrap();
        assert_eq!(
            storage.read_disk_sha(&path).unwrap(),
            Some(calculate_git_file_sha(b"hello"))
        );
    }
}

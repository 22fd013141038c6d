//! # Workspace
//!
//! A workspace record bound to the provider that stores its files.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::errors::{WorkspaceError, WorkspaceResult};
use crate::file_storage::{FileStorageError, FileStorageProvider, StoredFile, WsPath};
use crate::observability::{log_event_with_fields, Event};
use crate::workspace_db::{WorkspaceInfo, WorkspaceType};

/// Normalize extension allow-list entries to lowercase without a dot
pub fn normalize_extensions<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// An open workspace
#[derive(Clone)]
pub struct Workspace {
    info: WorkspaceInfo,
    provider: Arc<dyn FileStorageProvider>,
    // Empty means every extension is listed
    allowed_extensions: Arc<[String]>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("name", &self.info.name)
            .field("type", &self.info.ws_type)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Workspace {
    pub fn new(
        info: WorkspaceInfo,
        provider: Arc<dyn FileStorageProvider>,
        allowed_extensions: &[String],
    ) -> Self {
        Self {
            info,
            provider,
            allowed_extensions: normalize_extensions(allowed_extensions).into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn ws_type(&self) -> WorkspaceType {
        self.info.ws_type
    }

    pub fn info(&self) -> &WorkspaceInfo {
        &self.info
    }

    pub fn provider(&self) -> &Arc<dyn FileStorageProvider> {
        &self.provider
    }

    /// Build a path inside this workspace
    pub fn path(&self, file_path: &str) -> WorkspaceResult<WsPath> {
        WsPath::new(self.name(), file_path).map_err(|e| self.wrap(e))
    }

    /// True if the extension allow-list admits `path`
    pub fn is_supported(&self, path: &WsPath) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        path.extension()
            .map(|ext| self.allowed_extensions.iter().any(|allowed| *allowed == ext))
            .unwrap_or(false)
    }

    /// Supported files of the workspace, sorted. Others are logged and skipped.
    pub fn list_files(&self, cancel: &CancellationToken) -> WorkspaceResult<Vec<WsPath>> {
        let files = self
            .provider
            .list_all_files(self.name(), cancel)
            .map_err(|e| self.wrap(e))?;

        Ok(files
            .into_iter()
            .filter(|path| {
                let supported = self.is_supported(path);
                if !supported {
                    log_event_with_fields(
                        Event::FileSkippedUnsupported,
                        &[("ws_path", path.as_str())],
                    );
                }
                supported
            })
            .collect())
    }

    pub fn read_file(&self, path: &WsPath) -> WorkspaceResult<Option<StoredFile>> {
        self.check_path(path)?;
        self.provider.read_file(path).map_err(|e| self.wrap(e))
    }

    pub fn read_file_as_text(&self, path: &WsPath) -> WorkspaceResult<Option<String>> {
        let Some(file) = self.read_file(path)? else {
            return Ok(None);
        };

        String::from_utf8(file.content)
            .map(Some)
            .map_err(|_| WorkspaceError::InvalidUtf8(path.to_string()))
    }

    pub fn create_file(&self, path: &WsPath, content: &[u8]) -> WorkspaceResult<()> {
        self.check_path(path)?;
        self.provider.create_file(path, content).map_err(|e| self.wrap(e))
    }

    pub fn write_file(&self, path: &WsPath, content: &[u8]) -> WorkspaceResult<()> {
        self.check_path(path)?;
        self.provider.write_file(path, content).map_err(|e| self.wrap(e))
    }

    pub fn delete_file(&self, path: &WsPath) -> WorkspaceResult<()> {
        self.check_path(path)?;
        self.provider.delete_file(path).map_err(|e| self.wrap(e))
    }

    pub fn rename_file(&self, old_path: &WsPath, new_path: &WsPath) -> WorkspaceResult<()> {
        self.check_path(old_path)?;
        self.check_path(new_path)?;
        self.provider
            .rename_file(old_path, new_path)
            .map_err(|e| self.wrap(e))
    }

    pub fn file_exists(&self, path: &WsPath) -> WorkspaceResult<bool> {
        self.check_path(path)?;
        self.provider.file_exists(path).map_err(|e| self.wrap(e))
    }

    fn check_path(&self, path: &WsPath) -> WorkspaceResult<()> {
        if path.ws_name() != self.name() {
            return Err(WorkspaceError::WrongWorkspace {
                ws_name: self.name().to_string(),
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn wrap(&self, source: FileStorageError) -> WorkspaceError {
        WorkspaceError::Storage {
            ws_name: self.name().to_string(),
            provider: self.provider.name(),
            source,
        }
    }
}

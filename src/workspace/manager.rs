//! # Workspace Manager
//!
//! Creates, opens, lists and deletes workspaces. The provider comes from the
//! stored workspace type: browser workspaces share one on-disk provider
//! rooted at the files directory, memory workspaces each keep their own
//! provider for the manager's lifetime.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

use super::errors::{WorkspaceError, WorkspaceResult};
use super::workspace::{normalize_extensions, Workspace};
use crate::file_storage::{
    FileChangeCallback, FileStorage, FileStorageProvider, LocalBackend, MemoryBackend,
    StorageBackend,
};
use crate::workspace_db::{ListOptions, WorkspaceDatabase, WorkspaceInfo, WorkspaceType};

pub struct WorkspaceManager {
    db: WorkspaceDatabase,
    files_root: PathBuf,
    allowed_extensions: Vec<String>,
    on_file_change: Option<FileChangeCallback>,
    browser_provider: Arc<dyn FileStorageProvider>,
    memory_providers: Mutex<HashMap<String, Arc<dyn FileStorageProvider>>>,
}

impl fmt::Debug for WorkspaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceManager")
            .field("db", &self.db)
            .field("files_root", &self.files_root)
            .field("allowed_extensions", &self.allowed_extensions)
            .finish()
    }
}

impl WorkspaceManager {
    /// Browser workspace files go under `files_root/{wsName}/`
    pub fn new(
        db: WorkspaceDatabase,
        files_root: impl Into<PathBuf>,
        allowed_extensions: &[String],
        on_file_change: Option<FileChangeCallback>,
    ) -> Self {
        let files_root = files_root.into();
        let browser_provider: Arc<dyn FileStorageProvider> = Arc::new(Self::with_callback(
            FileStorage::new(LocalBackend::new(files_root.clone())),
            &on_file_change,
        ));

        Self {
            db,
            files_root,
            allowed_extensions: normalize_extensions(allowed_extensions),
            on_file_change,
            browser_provider,
            memory_providers: Mutex::new(HashMap::new()),
        }
    }

    fn with_callback<B: StorageBackend>(
        storage: FileStorage<B>,
        on_file_change: &Option<FileChangeCallback>,
    ) -> FileStorage<B> {
        match on_file_change {
            Some(callback) => storage.with_on_change(callback.clone()),
            None => storage,
        }
    }

    pub fn database(&self) -> &WorkspaceDatabase {
        &self.db
    }

    pub fn files_root(&self) -> &Path {
        &self.files_root
    }

    /// Create a workspace record and open it
    pub fn create_workspace(
        &self,
        name: &str,
        ws_type: WorkspaceType,
        metadata: Map<String, Value>,
    ) -> WorkspaceResult<Workspace> {
        let info = self.db.create_workspace_info(name, ws_type, metadata)?;
        self.bind(info)
    }

    /// Open an active workspace. Deleted or unknown names yield `None`.
    pub fn open_workspace(&self, name: &str) -> WorkspaceResult<Option<Workspace>> {
        match self.db.get_workspace_info(name, ListOptions::default())? {
            Some(info) => self.bind(info).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`Self::open_workspace`] but absence is an error
    pub fn require_workspace(&self, name: &str) -> WorkspaceResult<Workspace> {
        self.open_workspace(name)?
            .ok_or_else(|| WorkspaceError::NotFound(name.to_string()))
    }

    pub fn list_workspaces(&self, options: ListOptions) -> WorkspaceResult<Vec<WorkspaceInfo>> {
        Ok(self.db.get_all_workspaces(options)?)
    }

    /// Soft-delete a workspace.
    ///
    /// Memory workspaces lose their files; browser workspace files stay on
    /// disk but can no longer be opened through the manager.
    pub fn delete_workspace(&self, name: &str) -> WorkspaceResult<()> {
        // The database logs the deletion
        self.db.delete_workspace_info(name)?;
        self.providers()?.remove(name);
        Ok(())
    }

    fn providers(&self) -> WorkspaceResult<MutexGuard<'_, HashMap<String, Arc<dyn FileStorageProvider>>>> {
        self.memory_providers
            .lock()
            .map_err(|_| WorkspaceError::Internal("Lock poisoned".into()))
    }

    fn bind(&self, info: WorkspaceInfo) -> WorkspaceResult<Workspace> {
        let provider = self.provider_for(&info)?;
        Ok(Workspace::new(info, provider, &self.allowed_extensions))
    }

    fn provider_for(&self, info: &WorkspaceInfo) -> WorkspaceResult<Arc<dyn FileStorageProvider>> {
        match info.ws_type {
            WorkspaceType::Browser => Ok(self.browser_provider.clone()),
            WorkspaceType::Memory => {
                let provider = self
                    .providers()?
                    .entry(info.name.clone())
                    .or_insert_with(|| -> Arc<dyn FileStorageProvider> {
                        Arc::new(Self::with_callback(
                            FileStorage::new(MemoryBackend::new()),
                            &self.on_file_change,
                        ))
                    })
                    .clone();
                Ok(provider)
            }
        }
    }
}

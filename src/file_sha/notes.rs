//! # Note Store
//!
//! Editor-facing hooks. Reads and writes go through the workspace manager;
//! writes to open notes are bracketed so the tracker never mistakes them
//! for external changes.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use super::opened::ExternalChange;
use super::reader::DiskShaReader;
use super::sha::calculate_git_file_sha;
use super::tracker::FileShaTracker;
use crate::file_storage::WsPath;
use crate::workspace::{Workspace, WorkspaceManager, WorkspaceResult};

#[derive(Debug)]
pub struct NoteStore {
    manager: Arc<WorkspaceManager>,
    tracker: Arc<FileShaTracker>,
    external_changes: Mutex<Option<mpsc::UnboundedReceiver<ExternalChange>>>,
}

impl NoteStore {
    pub fn new(manager: Arc<WorkspaceManager>, reload_unblock_delay: Duration) -> Self {
        let reader: Arc<dyn DiskShaReader> = manager.clone();
        let (tracker, changes) = FileShaTracker::new(reader, reload_unblock_delay);

        Self {
            manager,
            tracker,
            external_changes: Mutex::new(Some(changes)),
        }
    }

    pub fn manager(&self) -> &Arc<WorkspaceManager> {
        &self.manager
    }

    pub fn tracker(&self) -> &Arc<FileShaTracker> {
        &self.tracker
    }

    /// Receiver for external changes to open notes. Only the first call gets it.
    pub fn take_external_changes(&self) -> Option<mpsc::UnboundedReceiver<ExternalChange>> {
        self.external_changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn workspace(&self, path: &WsPath) -> WorkspaceResult<Workspace> {
        self.manager.require_workspace(path.ws_name())
    }

    /// Open a note in the editor and start tracking it
    pub fn open_note(&self, path: &WsPath) -> WorkspaceResult<Option<String>> {
        let text = self.read_note(path)?;
        let sha = text.as_deref().map(|t| calculate_git_file_sha(t.as_bytes()));
        self.tracker.open_file(path, sha);
        Ok(text)
    }

    pub fn close_note(&self, path: &WsPath) {
        self.tracker.close_file(path);
    }

    pub fn read_note(&self, path: &WsPath) -> WorkspaceResult<Option<String>> {
        self.workspace(path)?.read_file_as_text(path)
    }

    /// Reload an open note after an external change and adopt the disk state
    pub fn reload_note(&self, path: &WsPath) -> WorkspaceResult<Option<String>> {
        let text = self.read_note(path)?;
        let sha = text.as_deref().map(|t| calculate_git_file_sha(t.as_bytes()));

        self.tracker.acknowledge_external_change(path);
        if let Some(sha) = sha {
            self.tracker.record_memory_sha(path, sha);
        }
        Ok(text)
    }

    /// Overwrite an existing note
    pub fn write_note(&self, path: &WsPath, text: &str) -> WorkspaceResult<()> {
        let workspace = self.workspace(path)?;
        self.tracked_write(path, text, |p, content| workspace.write_file(p, content))
    }

    /// Create a new note
    pub fn create_note(&self, path: &WsPath, text: &str) -> WorkspaceResult<()> {
        let workspace = self.workspace(path)?;
        self.tracked_write(path, text, |p, content| workspace.create_file(p, content))
    }

    fn tracked_write<F>(&self, path: &WsPath, text: &str, write: F) -> WorkspaceResult<()>
    where
        F: FnOnce(&WsPath, &[u8]) -> WorkspaceResult<()>,
    {
        let tracked = self.tracker.begin_write(path);

        match write(path, text.as_bytes()) {
            Ok(()) => {
                if tracked {
                    self.tracker
                        .finish_write(path, calculate_git_file_sha(text.as_bytes()));
                }
                Ok(())
            }
            Err(e) => {
                if tracked {
                    self.tracker.fail_write(path);
                }
                Err(e)
            }
        }
    }
}

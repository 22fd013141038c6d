//! # Opened File State

use serde::{Deserialize, Serialize};

use crate::file_storage::WsPath;

/// What a reconciliation pass saw on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskState {
    Present(String),
    Missing,
}

impl DiskState {
    pub fn sha(&self) -> Option<&str> {
        match self {
            DiskState::Present(sha) => Some(sha),
            DiskState::Missing => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalChangeKind {
    Modified,
    Deleted,
}

/// The disk content of an open file diverged from the editor's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalChange {
    pub ws_path: WsPath,
    pub kind: ExternalChangeKind,
    pub disk_sha: Option<String>,
}

/// Tracking record for one open file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedFile {
    pub ws_path: WsPath,
    pub open_count: usize,
    /// Hash of the content the editor holds
    pub sha: Option<String>,
    /// Disk hash the editor last agreed with
    pub last_known_disk_sha: Option<String>,
    /// Latest pass observation, `None` before the first one
    pub current_disk: Option<DiskState>,
    pub pending_writes: usize,
    /// Bumped whenever one of our writes starts, lands or fails
    pub write_generation: u64,
    /// Closed while a write was pending; dropped once the write settles
    pub close_pending: bool,
}

impl OpenedFile {
    pub(crate) fn new(ws_path: WsPath, sha: Option<String>) -> Self {
        Self {
            ws_path,
            open_count: 1,
            sha,
            last_known_disk_sha: None,
            current_disk: None,
            pending_writes: 0,
            write_generation: 0,
            close_pending: false,
        }
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending_writes > 0
    }

    pub fn current_disk_sha(&self) -> Option<&str> {
        self.current_disk.as_ref().and_then(DiskState::sha)
    }

    /// Record a pass observation, returning the change to report if any.
    ///
    /// A change is reported only when the observation differs from a
    /// previous one, differs from the editor's content and no write of ours
    /// is in flight.
    pub(crate) fn observe(&mut self, observed: DiskState) -> Option<ExternalChange> {
        if self.last_known_disk_sha.is_none() {
            if let DiskState::Present(sha) = &observed {
                self.last_known_disk_sha = Some(sha.clone());
            }
        }

        let previous = self.current_disk.replace(observed.clone())?;
        if previous == observed || self.has_pending_write() {
            return None;
        }
        // An unknown editor hash never matches, so a deletion still surfaces
        if self.sha.is_some() && observed.sha() == self.sha.as_deref() {
            return None;
        }

        let kind = match observed {
            DiskState::Present(_) => ExternalChangeKind::Modified,
            DiskState::Missing => ExternalChangeKind::Deleted,
        };
        Some(ExternalChange {
            ws_path: self.ws_path.clone(),
            kind,
            disk_sha: observed.sha().map(str::to_string),
        })
    }

    pub(crate) fn start_write(&mut self) {
        self.pending_writes += 1;
        self.write_generation += 1;
    }

    /// Our own write landed with content hash `sha`
    pub(crate) fn settle_write(&mut self, sha: String) {
        self.pending_writes = self.pending_writes.saturating_sub(1);
        self.write_generation += 1;
        self.last_known_disk_sha = Some(sha.clone());
        self.current_disk = Some(DiskState::Present(sha.clone()));
        self.sha = Some(sha);
    }

    /// Our own write failed; what is on disk is left to the next pass
    pub(crate) fn abandon_write(&mut self) {
        self.pending_writes = self.pending_writes.saturating_sub(1);
        self.write_generation += 1;
    }

    /// True once the record can be dropped
    pub(crate) fn is_released(&self) -> bool {
        self.open_count == 0 && !self.has_pending_write()
    }
}

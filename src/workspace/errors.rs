//! # Workspace Errors

use thiserror::Error;

use crate::file_storage::FileStorageError;
use crate::workspace_db::WorkspaceDbError;

/// Result type for workspace operations
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Workspace errors
#[derive(Debug, Clone, Error)]
pub enum WorkspaceError {
    /// Provider failure with the workspace it happened in
    #[error("{provider} storage failed in workspace {ws_name}: {source}")]
    Storage {
        ws_name: String,
        provider: &'static str,
        #[source]
        source: FileStorageError,
    },

    #[error("Path {path} does not belong to workspace {ws_name}")]
    WrongWorkspace { ws_name: String, path: String },

    #[error("Workspace not found: {0}")]
    NotFound(String),

    #[error("File is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error(transparent)]
    Db(#[from] WorkspaceDbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkspaceError {
    /// Stable error code; storage failures report the provider's code
    pub fn code(&self) -> &'static str {
        match self {
            WorkspaceError::Storage { source, .. } => source.code(),
            WorkspaceError::WrongWorkspace { .. } => "NOTE_WORKSPACE_WRONG_WORKSPACE",
            WorkspaceError::NotFound(_) => "NOTE_WORKSPACE_NOT_FOUND",
            WorkspaceError::InvalidUtf8(_) => "NOTE_WORKSPACE_INVALID_UTF8",
            WorkspaceError::Db(e) => e.code(),
            WorkspaceError::Internal(_) => "NOTE_WORKSPACE_INTERNAL",
        }
    }

    /// The provider error, if this wraps one
    pub fn storage_error(&self) -> Option<&FileStorageError> {
        match self {
            WorkspaceError::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}

//! # File Storage Errors

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Result type for storage operations
pub type FileStorageResult<T> = Result<T, FileStorageError>;

/// File storage errors
#[derive(Debug, Clone, Error)]
pub enum FileStorageError {
    // Precondition errors
    #[error("File does not exist: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Cannot rename {from} to {to}: paths belong to different workspaces")]
    CrossWorkspaceRename { from: String, to: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // Cancellation
    #[error("Operation aborted")]
    Aborted,

    // I/O errors
    #[error("Unknown storage error at {path}: {cause}")]
    Io {
        path: String,
        #[source]
        cause: Arc<io::Error>,
    },

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FileStorageError {
    /// Wrap an I/O failure, keeping the cause
    pub fn io(path: impl Into<String>, cause: io::Error) -> Self {
        FileStorageError::Io {
            path: path.into(),
            cause: Arc::new(cause),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            FileStorageError::FileNotFound(_) => "NOTE_FILE_NOT_FOUND",
            FileStorageError::FileAlreadyExists(_) => "NOTE_FILE_ALREADY_EXISTS",
            FileStorageError::CrossWorkspaceRename { .. } => "NOTE_FILE_CROSS_WORKSPACE_RENAME",
            FileStorageError::InvalidPath(_) => "NOTE_FILE_INVALID_PATH",
            FileStorageError::Aborted => "NOTE_FILE_ABORTED",
            FileStorageError::Io { .. } => "NOTE_FILE_UNKNOWN_ERROR",
            FileStorageError::Internal(_) => "NOTE_FILE_INTERNAL",
        }
    }

    /// True for caller mistakes, false for backend failures
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            FileStorageError::FileNotFound(_)
                | FileStorageError::FileAlreadyExists(_)
                | FileStorageError::CrossWorkspaceRename { .. }
                | FileStorageError::InvalidPath(_)
        )
    }
}

//! # Workspace Database Errors

use thiserror::Error;

use crate::table_store::TableStoreError;

/// Result type for workspace database operations
pub type WorkspaceDbResult<T> = Result<T, WorkspaceDbError>;

/// Workspace database errors
#[derive(Debug, Clone, Error)]
pub enum WorkspaceDbError {
    /// A record with this name exists, deleted or not
    #[error("Workspace already exists: {0}")]
    WorkspaceAlreadyExists(String),

    /// Name is empty or contains ':'
    #[error("Invalid workspace name: {0:?}")]
    InvalidWorkspaceName(String),

    /// Stored record does not decode as a workspace
    #[error("Corrupt workspace record {name}: {reason}")]
    CorruptRecord { name: String, reason: String },

    /// Record could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Underlying table store failure
    #[error(transparent)]
    Store(#[from] TableStoreError),
}

impl WorkspaceDbError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            WorkspaceDbError::WorkspaceAlreadyExists(_) => "NOTE_WORKSPACE_ALREADY_EXISTS",
            WorkspaceDbError::InvalidWorkspaceName(_) => "NOTE_WORKSPACE_INVALID_NAME",
            WorkspaceDbError::CorruptRecord { .. } => "NOTE_WORKSPACE_CORRUPT_RECORD",
            WorkspaceDbError::Serialization(_) => "NOTE_WORKSPACE_SERIALIZATION",
            WorkspaceDbError::Store(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_their_code() {
        let err: WorkspaceDbError = TableStoreError::QuotaExceeded { needed: 2, quota: 1 }.into();
        assert_eq!(err.code(), "NOTE_DB_QUOTA_EXCEEDED");
        assert!(err.to_string().contains("Quota exceeded"));
    }
}

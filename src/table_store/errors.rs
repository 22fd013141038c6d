//! # Table Store Errors
//!
//! Backend failures are folded into a single "unknown" kind that keeps the
//! original cause. Errors that are already [`TableStoreError`]s pass through
//! unchanged.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::broadcast::BroadcastError;
use crate::observability::{log_event_with_fields, Event};

/// Result type for table store operations
pub type TableStoreResult<T> = Result<T, TableStoreError>;

/// Boxed error raised inside a backend transaction
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Table store errors
#[derive(Debug, Clone, Error)]
pub enum TableStoreError {
    /// Backend I/O or serialization failure
    #[error("Database unknown error ({backend}): {cause}")]
    Unknown {
        backend: &'static str,
        #[source]
        cause: Arc<dyn StdError + Send + Sync>,
    },

    /// Write would exceed the backend's size limit
    #[error("Quota exceeded: {needed} bytes needed (max: {quota})")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Backend has no change feed
    #[error("Subscriptions are not supported by the {0} backend")]
    SubscribeUnsupported(&'static str),

    /// Change feed could not be attached
    #[error("Change feed error: {0}")]
    Broadcast(#[from] BroadcastError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TableStoreError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            TableStoreError::Unknown { .. } => "NOTE_DB_UNKNOWN_ERROR",
            TableStoreError::QuotaExceeded { .. } => "NOTE_DB_QUOTA_EXCEEDED",
            TableStoreError::SubscribeUnsupported(_) => "NOTE_DB_SUBSCRIBE_UNSUPPORTED",
            TableStoreError::Broadcast(_) => "NOTE_DB_CHANGE_FEED",
            TableStoreError::Internal(_) => "NOTE_DB_INTERNAL",
        }
    }

    /// Classify an error raised inside a backend transaction
    pub fn classify(backend: &'static str, err: BoxError) -> Self {
        match err.downcast::<TableStoreError>() {
            Ok(typed) => *typed,
            Err(other) => {
                log_event_with_fields(
                    Event::TableStoreBackendFailed,
                    &[("backend", backend), ("cause", other.to_string().as_str())],
                );
                TableStoreError::Unknown {
                    backend,
                    cause: Arc::from(other),
                }
            }
        }
    }

    pub(crate) fn poisoned() -> Self {
        TableStoreError::Internal("Lock poisoned".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_classify_wraps_foreign_errors() {
        let err: BoxError = Box::new(io::Error::new(io::ErrorKind::Other, "disk gone"));
        let classified = TableStoreError::classify("file", err);

        match &classified {
            TableStoreError::Unknown { backend, cause } => {
                assert_eq!(*backend, "file");
                assert!(cause.to_string().contains("disk gone"));
            }
            other => panic!("expected Unknown, got {:?}", other),
        }
        assert!(classified.source().is_some());
    }

    #[test]
    fn test_classify_passes_typed_errors_through() {
        let err: BoxError = Box::new(TableStoreError::QuotaExceeded { needed: 10, quota: 5 });
        let classified = TableStoreError::classify("kv", err);

        assert!(matches!(
            classified,
            TableStoreError::QuotaExceeded { needed: 10, quota: 5 }
        ));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TableStoreError::SubscribeUnsupported("memory").code(),
            "NOTE_DB_SUBSCRIBE_UNSUPPORTED"
        );
    }
}

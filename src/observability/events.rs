//! Observable events
//!
//! Every log line emitted by the crate names one of these events.

use std::fmt;

use super::logger::Severity;

/// Observable events in notecore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Configuration loaded
    ConfigLoaded,
    /// A tab session opened its stores
    SessionOpened,

    // Table store
    /// A backend failure was wrapped into an unknown storage error
    TableStoreBackendFailed,
    /// A table change notification could not be published
    TableChangePublishFailed,

    // Broadcast
    /// A message failed to serialize on the sending side
    BroadcastSendFailed,
    /// A received message failed validation and was dropped
    BroadcastMessageDropped,
    /// A native listener could not read its channel log
    BroadcastTailFailed,
    /// A native channel log passed its size limit and was restarted
    BroadcastLogRestarted,

    // Workspace metadata
    /// Workspace record created
    WorkspaceCreated,
    /// Workspace record soft-deleted
    WorkspaceDeleted,

    // Files
    /// A listed file was skipped because of its extension
    FileSkippedUnsupported,
    /// A file was renamed
    FileRenamed,

    // Reconciliation
    /// A reconciliation pass was skipped because one is already running
    ReconcilePassSkipped,
    /// A reconciliation pass completed
    ReconcilePassComplete,
    /// Reading the disk hash of one file failed
    FileShaReadFailed,
    /// The disk content of an open file changed outside this context
    ExternalChangeDetected,
    /// Page reload became blocked
    ReloadBlocked,
    /// Page reload became allowed again
    ReloadUnblocked,
    /// A reconciliation pass task panicked
    ReconcilePassFailed,
    /// The reconciler task stopped
    ReconcilerStopped,
}

impl Event {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SessionOpened => "SESSION_OPENED",
            Event::TableStoreBackendFailed => "TABLE_STORE_BACKEND_FAILED",
            Event::TableChangePublishFailed => "TABLE_CHANGE_PUBLISH_FAILED",
            Event::BroadcastSendFailed => "BROADCAST_SEND_FAILED",
            Event::BroadcastMessageDropped => "BROADCAST_MESSAGE_DROPPED",
            Event::BroadcastTailFailed => "BROADCAST_TAIL_FAILED",
            Event::BroadcastLogRestarted => "BROADCAST_LOG_RESTARTED",
            Event::WorkspaceCreated => "WORKSPACE_CREATED",
            Event::WorkspaceDeleted => "WORKSPACE_DELETED",
            Event::FileSkippedUnsupported => "FILE_SKIPPED_UNSUPPORTED",
            Event::FileRenamed => "FILE_RENAMED",
            Event::ReconcilePassSkipped => "RECONCILE_PASS_SKIPPED",
            Event::ReconcilePassComplete => "RECONCILE_PASS_COMPLETE",
            Event::FileShaReadFailed => "FILE_SHA_READ_FAILED",
            Event::ExternalChangeDetected => "EXTERNAL_CHANGE_DETECTED",
            Event::ReloadBlocked => "RELOAD_BLOCKED",
            Event::ReloadUnblocked => "RELOAD_UNBLOCKED",
            Event::ReconcilePassFailed => "RECONCILE_PASS_FAILED",
            Event::ReconcilerStopped => "RECONCILER_STOPPED",
        }
    }

    /// Default severity for this event
    pub fn severity(&self) -> Severity {
        match self {
            Event::TableStoreBackendFailed
            | Event::TableChangePublishFailed
            | Event::BroadcastSendFailed
            | Event::BroadcastMessageDropped
            | Event::FileShaReadFailed
            | Event::ReconcilePassFailed => Severity::Error,
            Event::FileSkippedUnsupported
            | Event::ExternalChangeDetected
            | Event::BroadcastTailFailed => Severity::Warn,
            Event::ReconcilePassSkipped | Event::ReconcilePassComplete => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

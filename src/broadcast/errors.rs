//! # Broadcast Errors

use thiserror::Error;

/// Result type for broadcast operations
pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Broadcast errors
#[derive(Debug, Clone, Error)]
pub enum BroadcastError {
    /// Message is missing its sender id or payload, or the payload has the wrong shape
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Outgoing payload could not be serialized
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Transport cannot deliver (no async runtime, closed channel)
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BroadcastError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            BroadcastError::InvalidMessage(_) => "NOTE_BROADCAST_INVALID_MESSAGE",
            BroadcastError::Serialization(_) => "NOTE_BROADCAST_SERIALIZATION",
            BroadcastError::TransportUnavailable(_) => "NOTE_BROADCAST_TRANSPORT_UNAVAILABLE",
            BroadcastError::Internal(_) => "NOTE_BROADCAST_INTERNAL",
        }
    }
}

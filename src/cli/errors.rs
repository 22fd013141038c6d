//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero status.

use std::io;

use thiserror::Error;

use crate::broadcast::BroadcastError;
use crate::config::ConfigError;
use crate::file_storage::FileStorageError;
use crate::workspace::WorkspaceError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Already initialized
    AlreadyInitialized,
    /// Not initialized
    NotInitialized,
    /// Malformed argument
    InvalidArgument,
    /// Workspace or file does not exist
    NotFound,
    /// Workspace or storage operation failed
    OperationFailed,
    /// Async runtime could not start
    RuntimeError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "NOTE_CLI_CONFIG_ERROR",
            Self::IoError => "NOTE_CLI_IO_ERROR",
            Self::AlreadyInitialized => "NOTE_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "NOTE_CLI_NOT_INITIALIZED",
            Self::InvalidArgument => "NOTE_CLI_INVALID_ARGUMENT",
            Self::NotFound => "NOTE_CLI_NOT_FOUND",
            Self::OperationFailed => "NOTE_CLI_OPERATION_FAILED",
            Self::RuntimeError => "NOTE_CLI_RUNTIME_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug, Error)]
#[error("{}: {}", .code.code(), .message)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Already initialized
    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Data directory already initialized",
        )
    }

    /// Not initialized
    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Data directory not initialized. Run 'notecore init' first.",
        )
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(CliErrorCode::NotFound, format!("Not found: {}", what.into()))
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<BroadcastError> for CliError {
    fn from(e: BroadcastError) -> Self {
        Self::new(CliErrorCode::OperationFailed, format!("[{}] {}", e.code(), e))
    }
}

impl From<FileStorageError> for CliError {
    fn from(e: FileStorageError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl From<WorkspaceError> for CliError {
    fn from(e: WorkspaceError) -> Self {
        match e {
            WorkspaceError::NotFound(name) => Self::not_found(format!("workspace {}", name)),
            other => Self::new(
                CliErrorCode::OperationFailed,
                format!("[{}] {}", other.code(), other),
            ),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

//! # Workspace Records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{WorkspaceDbError, WorkspaceDbResult};
use crate::file_storage::is_valid_ws_name;

/// Backing technology of a workspace's files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceType {
    /// Durable files under the data directory
    Browser,
    /// Volatile files, gone with the process
    Memory,
}

impl WorkspaceType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceType::Browser => "browser",
            WorkspaceType::Memory => "memory",
        }
    }
}

impl fmt::Display for WorkspaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkspaceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "browser" => Ok(WorkspaceType::Browser),
            "memory" => Ok(WorkspaceType::Memory),
            other => Err(format!("unknown workspace type '{}'", other)),
        }
    }
}

/// A workspace record, keyed by name in the `workspace-info` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ws_type: WorkspaceType,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

impl WorkspaceInfo {
    /// A fresh, active record
    pub fn new(name: impl Into<String>, ws_type: WorkspaceType, metadata: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            ws_type,
            metadata,
            last_modified: Utc::now(),
            deleted: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.deleted
    }
}

/// Listing and lookup options
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Include soft-deleted records
    pub allow_deleted: bool,
}

impl ListOptions {
    pub fn with_deleted() -> Self {
        Self { allow_deleted: true }
    }
}

/// Names double as the prefix of workspace paths and as a directory name
pub fn validate_workspace_name(name: &str) -> WorkspaceDbResult<()> {
    if !is_valid_ws_name(name) {
        return Err(WorkspaceDbError::InvalidWorkspaceName(name.to_string()));
    }
    Ok(())
}

//! # Workspace Database Events

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::info::WorkspaceInfo;

/// Change emitted by a [`super::WorkspaceDatabase`] to its owner.
///
/// Only creation carries the record; other events carry the key and
/// consumers re-read when they need the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DbChangeEvent {
    WorkspaceCreate { info: WorkspaceInfo },
    WorkspaceUpdate { name: String },
    WorkspaceDelete { name: String },
    MiscUpdate { key: String },
    MiscDelete { key: String },
}

/// Owner callback for database events
pub type DbChangeCallback = Arc<dyn Fn(&DbChangeEvent) + Send + Sync>;

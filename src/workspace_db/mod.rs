//! # Workspace Metadata Database
//!
//! Workspace records (`workspace-info` table) and misc blobs (`misc` table)
//! built on the table store, with typed change events for the owner.

pub mod database;
pub mod errors;
pub mod events;
pub mod info;

pub use database::WorkspaceDatabase;
pub use errors::{WorkspaceDbError, WorkspaceDbResult};
pub use events::{DbChangeCallback, DbChangeEvent};
pub use info::{validate_workspace_name, ListOptions, WorkspaceInfo, WorkspaceType};

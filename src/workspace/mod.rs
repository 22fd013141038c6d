//! # Workspaces
//!
//! Binds workspace records to file providers and threads workspace context
//! into provider errors.

pub mod errors;
pub mod manager;
pub mod workspace;

pub use errors::{WorkspaceError, WorkspaceResult};
pub use manager::WorkspaceManager;
pub use workspace::{normalize_extensions, Workspace};

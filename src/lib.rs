//! notecore - workspace storage and cross-tab reconciliation for a notes app
//!
//! Layers, bottom up:
//! - `broadcast`: typed pub/sub between contexts
//! - `table_store`: key/value tables with change notifications
//! - `workspace_db`: workspace records and misc blobs
//! - `file_storage`: `wsName:relativePath` file providers
//! - `workspace`: workspaces bound to their providers
//! - `file_sha`: detection of external changes to open notes

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod file_sha;
pub mod file_storage;
pub mod observability;
pub mod session;
pub mod table_store;
pub mod workspace;
pub mod workspace_db;

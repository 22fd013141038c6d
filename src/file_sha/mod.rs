//! # File-Sha Reconciliation
//!
//! Detects when the stored content of an open note changes outside this
//! context (another tab, another process) and tells the editor once per
//! change. Also decides when a page reload is safe.

pub mod notes;
pub mod opened;
pub mod reader;
pub mod reload_gate;
pub mod sha;
pub mod tracker;

pub use notes::NoteStore;
pub use opened::{DiskState, ExternalChange, ExternalChangeKind, OpenedFile};
pub use reader::DiskShaReader;
pub use reload_gate::{ReloadGate, DEFAULT_RELOAD_UNBLOCK_DELAY};
pub use sha::calculate_git_file_sha;
pub use tracker::{FileShaTracker, PassReport};

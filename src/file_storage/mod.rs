//! # File Storage
//!
//! Workspace-scoped file providers. Paths are `wsName:relativePath`; every
//! provider enforces the same preconditions and reports mutations as
//! [`FileChangeEvent`]s.

pub mod backend;
pub mod errors;
pub mod events;
pub mod file;
pub mod local;
pub mod memory;
pub mod path;

pub use backend::{StorageBackend, StoredFile};
pub use errors::{FileStorageError, FileStorageResult};
pub use events::{FileChangeCallback, FileChangeEvent};
pub use file::{FileStorage, FileStorageProvider};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use path::{is_valid_ws_name, WsPath};

//! # Table Store
//!
//! Minimal key-value storage over named tables (`workspace-info`, `misc`,
//! `sync`). `update_entry` is the only write primitive: create and update are
//! one read-modify-write, atomic per key within a store instance. Across
//! contexts, writes are last-write-wins.
//!
//! ## Backends
//!
//! - [`FileTableStore`]: durable, one JSON file per table, change feed
//! - [`QuotaTableStore`]: synchronous, size-limited, change feed
//! - [`MemoryTableStore`]: volatile, no change feed

pub mod errors;
mod feed;
pub mod file;
pub mod memory;
pub mod quota;
pub mod table;

pub use errors::{TableStoreError, TableStoreResult};
pub use file::FileTableStore;
pub use memory::MemoryTableStore;
pub use quota::{QuotaTableStore, DEFAULT_QUOTA_BYTES};
pub use table::{ChangeKind, TableChange, TableChangeCallback, TableName, TableStore, UpdateFn};

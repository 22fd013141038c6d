//! # Durable Table Store
//!
//! One JSON document per table under a directory shared by every context.
//! Each operation re-reads the table from disk so writes from other contexts
//! are visible, and every write replaces the document through a temp file
//! and a rename. Committed mutations are announced on the change feed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::errors::{BoxError, TableStoreError, TableStoreResult};
use super::feed::ChangeFeed;
use super::table::{
    apply_update, ChangeKind, TableChange, TableChangeCallback, TableName, TableStore, UpdateFn,
};
use crate::broadcast::BroadcastTransport;

const BACKEND: &str = "file";

type Entries = BTreeMap<String, Value>;

/// File-backed durable table store
#[derive(Debug)]
pub struct FileTableStore {
    dir: PathBuf,
    // Serializes read-modify-write-persist within this store
    lock: Mutex<()>,
    feed: ChangeFeed,
}

impl FileTableStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// Changes are published on the channel named `service_name`.
    pub fn open(
        dir: impl Into<PathBuf>,
        service_name: &str,
        transport: Arc<dyn BroadcastTransport>,
    ) -> TableStoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| TableStoreError::classify(BACKEND, Box::new(e)))?;

        Ok(Self {
            dir,
            lock: Mutex::new(()),
            feed: ChangeFeed::new(service_name, transport),
        })
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: TableName) -> PathBuf {
        self.dir.join(format!("{}.json", table.as_str()))
    }

    fn load(&self, table: TableName) -> Result<Entries, BoxError> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(Entries::new());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, table: TableName, entries: &Entries) -> Result<(), BoxError> {
        let path = self.table_path(table);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", table.as_str(), Uuid::new_v4()));

        fs::write(&tmp, serde_json::to_vec(entries)?)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn transact<T>(&self, f: impl FnOnce() -> Result<T, BoxError>) -> TableStoreResult<T> {
        let _guard = self.lock.lock().map_err(|_| TableStoreError::poisoned())?;
        f().map_err(|e| TableStoreError::classify(BACKEND, e))
    }
}

impl TableStore for FileTableStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn get_entry(&self, table: TableName, key: &str) -> TableStoreResult<Option<Value>> {
        self.transact(|| Ok(self.load(table)?.remove(key)))
    }

    fn update_entry(
        &self,
        table: TableName,
        key: &str,
        update: UpdateFn<'_>,
    ) -> TableStoreResult<Option<Value>> {
        let (value, kind) = self.transact(|| {
            let mut entries = self.load(table)?;
            let (value, kind) = apply_update(&mut entries, key, update);
            if kind.is_some() {
                self.persist(table, &entries)?;
            }
            Ok((value, kind))
        })?;

        if let Some(kind) = kind {
            self.feed.publish(TableChange {
                table,
                key: key.to_string(),
                kind,
            });
        }
        Ok(value)
    }

    fn delete_entry(&self, table: TableName, key: &str) -> TableStoreResult<bool> {
        let removed = self.transact(|| {
            let mut entries = self.load(table)?;
            if entries.remove(key).is_none() {
                return Ok(false);
            }
            self.persist(table, &entries)?;
            Ok(true)
        })?;

        if removed {
            self.feed.publish(TableChange {
                table,
                key: key.to_string(),
                kind: ChangeKind::Delete,
            });
        }
        Ok(removed)
    }

    fn get_all_entries(&self, table: TableName) -> TableStoreResult<Vec<Value>> {
        self.transact(|| Ok(self.load(table)?.into_values().collect()))
    }

    fn subscribe(
        &self,
        table: TableName,
        callback: TableChangeCallback,
        cancel: CancellationToken,
    ) -> TableStoreResult<()> {
        self.feed.subscribe(table, callback, cancel)
    }
}

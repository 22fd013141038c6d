//! # Size-Limited Key/Value Table Store
//!
//! Every table lives in one flat string map keyed `"{table}:{key}"`, with
//! values stored as serialized JSON, persisted to a single file. The sum of
//! key and value lengths is capped; a write that would exceed the cap fails
//! with [`TableStoreError::QuotaExceeded`] and changes nothing.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
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

const BACKEND: &str = "kv";

/// Default size cap, in bytes
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

type Flat = BTreeMap<String, String>;

/// Size-limited synchronous key/value store
#[derive(Debug)]
pub struct QuotaTableStore {
    path: PathBuf,
    quota_bytes: usize,
    lock: Mutex<()>,
    feed: ChangeFeed,
}

impl QuotaTableStore {
    /// Open (creating the parent directory if needed) the store file at
    /// `{dir}/{service_name}.kv.json`
    pub fn open(
        dir: impl Into<PathBuf>,
        service_name: &str,
        quota_bytes: usize,
        transport: Arc<dyn BroadcastTransport>,
    ) -> TableStoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| TableStoreError::classify(BACKEND, Box::new(e)))?;

        Ok(Self {
            path: dir.join(format!("{}.kv.json", service_name)),
            quota_bytes,
            lock: Mutex::new(()),
            feed: ChangeFeed::new(service_name, transport),
        })
    }

    /// Bytes currently used by keys and values
    pub fn used_bytes(&self) -> TableStoreResult<usize> {
        self.transact(|| Ok(used_bytes(&self.load()?)))
    }

    fn flat_key(table: TableName, key: &str) -> String {
        format!("{}:{}", table.as_str(), key)
    }

    fn load(&self) -> Result<Flat, BoxError> {
        if !self.path.exists() {
            return Ok(Flat::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, flat: &Flat) -> Result<(), BoxError> {
        let needed = used_bytes(flat);
        if needed > self.quota_bytes {
            return Err(Box::new(TableStoreError::QuotaExceeded {
                needed,
                quota: self.quota_bytes,
            }));
        }

        let tmp = self.path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, serde_json::to_vec(flat)?)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Decode one table out of the flat map
    fn table_entries(flat: &Flat, table: TableName) -> Result<BTreeMap<String, Value>, BoxError> {
        let prefix = format!("{}:", table.as_str());
        let mut entries = BTreeMap::new();
        for (flat_key, raw) in flat.range(prefix.clone()..) {
            let Some(key) = flat_key.strip_prefix(&prefix) else {
                break;
            };
            entries.insert(key.to_string(), serde_json::from_str(raw)?);
        }
        Ok(entries)
    }

    fn transact<T>(&self, f: impl FnOnce() -> Result<T, BoxError>) -> TableStoreResult<T> {
        let _guard = self.lock.lock().map_err(|_| TableStoreError::poisoned())?;
        f().map_err(|e| TableStoreError::classify(BACKEND, e))
    }
}

fn used_bytes(flat: &Flat) -> usize {
    flat.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl TableStore for QuotaTableStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn get_entry(&self, table: TableName, key: &str) -> TableStoreResult<Option<Value>> {
        self.transact(|| {
            let flat = self.load()?;
            match flat.get(&Self::flat_key(table, key)) {
                Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
                None => Ok(None),
            }
        })
    }

    fn update_entry(
        &self,
        table: TableName,
        key: &str,
        update: UpdateFn<'_>,
    ) -> TableStoreResult<Option<Value>> {
        let (value, kind) = self.transact(|| {
            let mut flat = self.load()?;
            let flat_key = Self::flat_key(table, key);

            let mut single = BTreeMap::new();
            if let Some(raw) = flat.get(&flat_key) {
                single.insert(key.to_string(), serde_json::from_str::<Value>(raw)?);
            }

            let (value, kind) = apply_update(&mut single, key, update);
            if let (Some(stored), Some(_)) = (&value, kind) {
                flat.insert(flat_key, serde_json::to_string(stored)?);
                self.persist(&flat)?;
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
            let mut flat = self.load()?;
            if flat.remove(&Self::flat_key(table, key)).is_none() {
                return Ok(false);
            }
            self.persist(&flat)?;
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
        self.transact(|| {
            let flat = self.load()?;
            Ok(Self::table_entries(&flat, table)?.into_values().collect())
        })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::InProcessTransport;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(temp: &TempDir, quota: usize) -> QuotaTableStore {
        QuotaTableStore::open(
            temp.path(),
            "notes-kv",
            quota,
            Arc::new(InProcessTransport::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_tables_share_one_namespace_but_stay_isolated() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, DEFAULT_QUOTA_BYTES);

        store
            .update_entry(TableName::Misc, "a:b", Box::new(|_| Some(json!("misc"))))
            .unwrap();
        store
            .update_entry(TableName::Sync, "a:b", Box::new(|_| Some(json!("sync"))))
            .unwrap();

        assert_eq!(store.get_entry(TableName::Misc, "a:b").unwrap(), Some(json!("misc")));
        assert_eq!(store.get_all_entries(TableName::Sync).unwrap(), vec![json!("sync")]);
        assert!(store.get_all_entries(TableName::WorkspaceInfo).unwrap().is_empty());
    }

    #[test]
    fn test_quota_exceeded_leaves_state_unchanged() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, 64);

        store
            .update_entry(TableName::Misc, "small", Box::new(|_| Some(json!("ok"))))
            .unwrap();
        let before = store.used_bytes().unwrap();

        let result = store.update_entry(
            TableName::Misc,
            "big",
            Box::new(|_| Some(json!("x".repeat(200)))),
        );

        assert!(matches!(result, Err(TableStoreError::QuotaExceeded { quota: 64, .. })));
        assert_eq!(store.get_entry(TableName::Misc, "big").unwrap(), None);
        assert_eq!(store.used_bytes().unwrap(), before);
    }

    #[test]
    fn test_delete_frees_space() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, DEFAULT_QUOTA_BYTES);

        store
            .update_entry(TableName::Misc, "k", Box::new(|_| Some(json!([1, 2, 3]))))
            .unwrap();
        assert!(store.used_bytes().unwrap() > 0);

        store.delete_entry(TableName::Misc, "k").unwrap();
        store.delete_entry(TableName::Misc, "k").unwrap();
        assert_eq!(store.used_bytes().unwrap(), 0);
    }
}

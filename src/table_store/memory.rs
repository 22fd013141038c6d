//! # Volatile Table Store
//!
//! Process-local tables for tests and ephemeral contexts. Nothing survives
//! the store, and there is no change feed.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value;

use super::errors::{TableStoreError, TableStoreResult};
use super::table::{apply_update, TableName, TableStore, UpdateFn};

/// In-memory table store
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<TableName, BTreeMap<String, Value>>>,
}

impl MemoryTableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryTableStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn get_entry(&self, table: TableName, key: &str) -> TableStoreResult<Option<Value>> {
        let tables = self.tables.read().map_err(|_| TableStoreError::poisoned())?;
        Ok(tables.get(&table).and_then(|entries| entries.get(key)).cloned())
    }

    fn update_entry(
        &self,
        table: TableName,
        key: &str,
        update: UpdateFn<'_>,
    ) -> TableStoreResult<Option<Value>> {
        let mut tables = self.tables.write().map_err(|_| TableStoreError::poisoned())?;
        let (value, _) = apply_update(tables.entry(table).or_default(), key, update);
        Ok(value)
    }

    fn delete_entry(&self, table: TableName, key: &str) -> TableStoreResult<bool> {
        let mut tables = self.tables.write().map_err(|_| TableStoreError::poisoned())?;
        Ok(tables
            .get_mut(&table)
            .and_then(|entries| entries.remove(key))
            .is_some())
    }

    fn get_all_entries(&self, table: TableName) -> TableStoreResult<Vec<Value>> {
        let tables = self.tables.read().map_err(|_| TableStoreError::poisoned())?;
        Ok(tables
            .get(&table)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }
}

//! # Table Store Contract

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::errors::{TableStoreError, TableStoreResult};
use crate::broadcast::BroadcastMessage;

/// Named namespace inside a table store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableName {
    /// Workspace records
    WorkspaceInfo,
    /// Preferences and other small blobs
    Misc,
    /// Sync layer state
    Sync,
}

impl TableName {
    /// Every table
    pub const ALL: [TableName; 3] = [TableName::WorkspaceInfo, TableName::Misc, TableName::Sync];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::WorkspaceInfo => "workspace-info",
            TableName::Misc => "misc",
            TableName::Sync => "sync",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of mutation reported on a change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// A mutation committed by some context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableChange {
    pub table: TableName,
    pub key: String,
    pub kind: ChangeKind,
}

/// Read-modify-write callback. Receives the current value, returns the
/// replacement or `None` to leave the entry untouched.
pub type UpdateFn<'a> = Box<dyn FnOnce(Option<&Value>) -> Option<Value> + 'a>;

/// Change feed callback
pub type TableChangeCallback = Arc<dyn Fn(BroadcastMessage<TableChange>) + Send + Sync>;

/// Key-value storage split into isolated tables
pub trait TableStore: Send + Sync + fmt::Debug {
    /// Short backend name for errors and logs
    fn backend_name(&self) -> &'static str;

    /// Read one entry. Absence is `Ok(None)`.
    fn get_entry(&self, table: TableName, key: &str) -> TableStoreResult<Option<Value>>;

    /// Atomically read-modify-write one entry; returns the stored value afterwards.
    fn update_entry(
        &self,
        table: TableName,
        key: &str,
        update: UpdateFn<'_>,
    ) -> TableStoreResult<Option<Value>>;

    /// Remove one entry, returning whether it existed. Removing an absent
    /// key is a no-op.
    fn delete_entry(&self, table: TableName, key: &str) -> TableStoreResult<bool>;

    /// Every value in a table, in no particular order
    fn get_all_entries(&self, table: TableName) -> TableStoreResult<Vec<Value>>;

    /// Receive a [`TableChange`] for every mutation of `table` made by any
    /// context sharing this backend, until `cancel` fires.
    fn subscribe(
        &self,
        table: TableName,
        callback: TableChangeCallback,
        cancel: CancellationToken,
    ) -> TableStoreResult<()> {
        let _ = (table, callback, cancel);
        Err(TableStoreError::SubscribeUnsupported(self.backend_name()))
    }
}

/// Apply an update callback to one table's entries.
///
/// Returns the stored value and the kind of change made, if any.
pub(crate) fn apply_update(
    entries: &mut BTreeMap<String, Value>,
    key: &str,
    update: UpdateFn<'_>,
) -> (Option<Value>, Option<ChangeKind>) {
    let existed = entries.contains_key(key);

    match update(entries.get(key)) {
        Some(value) => {
            entries.insert(key.to_string(), value.clone());
            let kind = if existed {
                ChangeKind::Update
            } else {
                ChangeKind::Create
            };
            (Some(value), Some(kind))
        }
        None => (entries.get(key).cloned(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_wire_names() {
        assert_eq!(TableName::WorkspaceInfo.as_str(), "workspace-info");
        assert_eq!(
            serde_json::to_value(TableName::WorkspaceInfo).unwrap(),
            json!("workspace-info")
        );
        assert_eq!(TableName::Sync.to_string(), "sync");
    }

    #[test]
    fn test_apply_update_create_then_update() {
        let mut entries = BTreeMap::new();

        let (value, kind) = apply_update(&mut entries, "k", Box::new(|_| Some(json!(1))));
        assert_eq!(value, Some(json!(1)));
        assert_eq!(kind, Some(ChangeKind::Create));

        let (value, kind) = apply_update(
            &mut entries,
            "k",
            Box::new(|v| Some(json!(v.and_then(Value::as_i64).unwrap_or(0) + 1))),
        );
        assert_eq!(value, Some(json!(2)));
        assert_eq!(kind, Some(ChangeKind::Update));
    }

    #[test]
    fn test_apply_update_noop() {
        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), json!("kept"));

        let (value, kind) = apply_update(&mut entries, "k", Box::new(|_| None));
        assert_eq!(value, Some(json!("kept")));
        assert_eq!(kind, None);

        let (value, kind) = apply_update(&mut entries, "absent", Box::new(|_| None));
        assert_eq!(value, None);
        assert_eq!(kind, None);
        assert!(!entries.contains_key("absent"));
    }
}

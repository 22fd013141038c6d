//! # Workspace Database
//!
//! Lifecycle per name: `absent → active → deleted`. Deletion only sets a
//! flag; records are never removed, so a stale context cannot resurrect a
//! deleted workspace by recreating its key.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::errors::{WorkspaceDbError, WorkspaceDbResult};
use super::events::{DbChangeCallback, DbChangeEvent};
use super::info::{validate_workspace_name, ListOptions, WorkspaceInfo, WorkspaceType};
use crate::observability::{log_event_with_fields, Event};
use crate::table_store::{TableChangeCallback, TableName, TableStore};

/// Workspace metadata and misc blobs over a [`TableStore`]
pub struct WorkspaceDatabase {
    store: Arc<dyn TableStore>,
    on_change: Option<DbChangeCallback>,
}

impl fmt::Debug for WorkspaceDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceDatabase")
            .field("store", &self.store.backend_name())
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl WorkspaceDatabase {
    /// Create a database over `store`
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            on_change: None,
        }
    }

    /// Register the owner callback for change events
    pub fn with_on_change(mut self, callback: DbChangeCallback) -> Self {
        self.on_change = Some(callback);
        self
    }

    /// Backing store
    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    fn emit(&self, event: DbChangeEvent) {
        if let Some(callback) = &self.on_change {
            callback(&event);
        }
    }

    fn decode(name: &str, value: Value) -> WorkspaceDbResult<WorkspaceInfo> {
        serde_json::from_value(value).map_err(|e| WorkspaceDbError::CorruptRecord {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    // ==================
    // Workspace records
    // ==================

    /// Create an active workspace record.
    ///
    /// Fails if any record with this name exists, including a deleted one.
    pub fn create_workspace_info(
        &self,
        name: &str,
        ws_type: WorkspaceType,
        metadata: Map<String, Value>,
    ) -> WorkspaceDbResult<WorkspaceInfo> {
        validate_workspace_name(name)?;

        let info = WorkspaceInfo::new(name, ws_type, metadata);
        let encoded =
            serde_json::to_value(&info).map_err(|e| WorkspaceDbError::Serialization(e.to_string()))?;

        let mut existed = false;
        self.store.update_entry(
            TableName::WorkspaceInfo,
            name,
            Box::new(|current| {
                if current.is_some() {
                    existed = true;
                    None
                } else {
                    Some(encoded)
                }
            }),
        )?;

        if existed {
            return Err(WorkspaceDbError::WorkspaceAlreadyExists(name.to_string()));
        }

        log_event_with_fields(
            Event::WorkspaceCreated,
            &[("name", name), ("type", ws_type.as_str())],
        );
        self.emit(DbChangeEvent::WorkspaceCreate { info: info.clone() });
        Ok(info)
    }

    /// Look up one workspace
    pub fn get_workspace_info(
        &self,
        name: &str,
        options: ListOptions,
    ) -> WorkspaceDbResult<Option<WorkspaceInfo>> {
        let Some(value) = self.store.get_entry(TableName::WorkspaceInfo, name)? else {
            return Ok(None);
        };

        let info = Self::decode(name, value)?;
        if info.deleted && !options.allow_deleted {
            return Ok(None);
        }
        Ok(Some(info))
    }

    /// Read-modify-write an active workspace.
    ///
    /// Returns `false` when the workspace is absent or deleted. The update
    /// cannot rename the record or change its deleted flag.
    pub fn update_workspace_info<F>(&self, name: &str, update: F) -> WorkspaceDbResult<bool>
    where
        F: FnOnce(WorkspaceInfo) -> WorkspaceInfo,
    {
        let mut failure: Option<WorkspaceDbError> = None;
        let mut updated = false;

        self.store.update_entry(
            TableName::WorkspaceInfo,
            name,
            Box::new(|current| {
                let info = match Self::decode(name, current?.clone()) {
                    Ok(info) => info,
                    Err(e) => {
                        failure = Some(e);
                        return None;
                    }
                };
                if info.deleted {
                    return None;
                }

                let mut next = update(info);
                next.name = name.to_string();
                next.deleted = false;
                next.last_modified = Utc::now();

                match serde_json::to_value(&next) {
                    Ok(value) => {
                        updated = true;
                        Some(value)
                    }
                    Err(e) => {
                        failure = Some(WorkspaceDbError::Serialization(e.to_string()));
                        None
                    }
                }
            }),
        )?;

        if let Some(e) = failure {
            return Err(e);
        }
        if updated {
            self.emit(DbChangeEvent::WorkspaceUpdate {
                name: name.to_string(),
            });
        }
        Ok(updated)
    }

    /// Soft-delete a workspace. Absent or already deleted names are a no-op.
    pub fn delete_workspace_info(&self, name: &str) -> WorkspaceDbResult<()> {
        let mut failure: Option<WorkspaceDbError> = None;
        let mut transitioned = false;

        self.store.update_entry(
            TableName::WorkspaceInfo,
            name,
            Box::new(|current| {
                let mut info = match Self::decode(name, current?.clone()) {
                    Ok(info) => info,
                    Err(e) => {
                        failure = Some(e);
                        return None;
                    }
                };
                if info.deleted {
                    return None;
                }

                info.deleted = true;
                info.last_modified = Utc::now();
                match serde_json::to_value(&info) {
                    Ok(value) => {
                        transitioned = true;
                        Some(value)
                    }
                    Err(e) => {
                        failure = Some(WorkspaceDbError::Serialization(e.to_string()));
                        None
                    }
                }
            }),
        )?;

        if let Some(e) = failure {
            return Err(e);
        }
        if transitioned {
            log_event_with_fields(Event::WorkspaceDeleted, &[("name", name)]);
            self.emit(DbChangeEvent::WorkspaceDelete {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Merge `update(existing)` key by key into the workspace metadata.
    ///
    /// Returns `false` if the workspace went away; that race is expected.
    pub fn update_workspace_metadata<F>(&self, name: &str, update: F) -> WorkspaceDbResult<bool>
    where
        F: FnOnce(&Map<String, Value>) -> Map<String, Value>,
    {
        self.update_workspace_info(name, |mut info| {
            let patch = update(&info.metadata);
            for (key, value) in patch {
                info.metadata.insert(key, value);
            }
            info
        })
    }

    /// All workspaces, sorted by name
    pub fn get_all_workspaces(&self, options: ListOptions) -> WorkspaceDbResult<Vec<WorkspaceInfo>> {
        let mut workspaces = Vec::new();

        for value in self.store.get_all_entries(TableName::WorkspaceInfo)? {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>")
                .to_string();
            let info = Self::decode(&name, value)?;
            if info.deleted && !options.allow_deleted {
                continue;
            }
            workspaces.push(info);
        }

        workspaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workspaces)
    }

    // ==================
    // Misc blobs
    // ==================

    pub fn get_misc_data(&self, key: &str) -> WorkspaceDbResult<Option<Value>> {
        Ok(self.store.get_entry(TableName::Misc, key)?)
    }

    pub fn set_misc_data(&self, key: &str, value: Value) -> WorkspaceDbResult<()> {
        self.store
            .update_entry(TableName::Misc, key, Box::new(|_| Some(value)))?;
        self.emit(DbChangeEvent::MiscUpdate {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Read-modify-write a misc blob; `None` from `update` leaves it as is
    pub fn update_misc_data<F>(&self, key: &str, update: F) -> WorkspaceDbResult<Option<Value>>
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        let mut changed = false;
        let stored = self.store.update_entry(
            TableName::Misc,
            key,
            Box::new(|current| {
                let next = update(current);
                changed = next.is_some();
                next
            }),
        )?;

        if changed {
            self.emit(DbChangeEvent::MiscUpdate {
                key: key.to_string(),
            });
        }
        Ok(stored)
    }

    pub fn delete_misc_data(&self, key: &str) -> WorkspaceDbResult<()> {
        if self.store.delete_entry(TableName::Misc, key)? {
            self.emit(DbChangeEvent::MiscDelete {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Cross-context hints for one table. Receivers re-read what they need.
    pub fn watch(
        &self,
        table: TableName,
        callback: TableChangeCallback,
        cancel: CancellationToken,
    ) -> WorkspaceDbResult<()> {
        Ok(self.store.subscribe(table, callback, cancel)?)
    }
}

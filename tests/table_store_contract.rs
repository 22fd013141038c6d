//! Table Store Contract Tests
//!
//! Every backend honors the same contract:
//! - Read-modify-write is atomic per key within one store instance
//! - Tables are isolated from each other
//! - Deleting an absent key is a no-op
//! - Change feeds deliver to every context, the writer included

use std::sync::{Arc, Mutex};
use std::thread;

use notecore::broadcast::{BroadcastMessage, BroadcastTransport, InProcessTransport};
use notecore::table_store::{
    ChangeKind, FileTableStore, MemoryTableStore, QuotaTableStore, TableChange, TableName,
    TableStore, TableStoreError,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Utilities
// =============================================================================

fn backends(temp_dir: &TempDir) -> Vec<Arc<dyn TableStore>> {
    let transport: Arc<dyn BroadcastTransport> = Arc::new(InProcessTransport::new());
    vec![
        Arc::new(MemoryTableStore::new()),
        Arc::new(FileTableStore::open(temp_dir.path().join("file"), "contract", transport.clone()).unwrap()),
        Arc::new(QuotaTableStore::open(temp_dir.path().join("kv"), "contract", 1 << 20, transport).unwrap()),
    ]
}

fn increment(store: &dyn TableStore, key: &str) {
    store
        .update_entry(
            TableName::Misc,
            key,
            Box::new(|current: Option<&Value>| {
                let n = current.and_then(Value::as_u64).unwrap_or(0);
                Some(json!(n + 1))
            }),
        )
        .unwrap();
}

// =============================================================================
// Atomicity
// =============================================================================

#[test]
fn test_concurrent_increments_are_not_lost() {
    let temp_dir = TempDir::new().unwrap();

    for store in backends(&temp_dir) {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        increment(store.as_ref(), "counter");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.get_entry(TableName::Misc, "counter").unwrap(),
            Some(json!(100)),
            "{} lost updates",
            store.backend_name()
        );
    }
}

#[test]
fn test_update_returning_none_leaves_entry() {
    let temp_dir = TempDir::new().unwrap();

    for store in backends(&temp_dir) {
        increment(store.as_ref(), "k");
        let after = store
            .update_entry(TableName::Misc, "k", Box::new(|_: Option<&Value>| None))
            .unwrap();

        assert_eq!(after, Some(json!(1)), "{}", store.backend_name());
    }
}

// =============================================================================
// Isolation and deletion
// =============================================================================

#[test]
fn test_tables_are_isolated() {
    let temp_dir = TempDir::new().unwrap();

    for store in backends(&temp_dir) {
        store
            .update_entry(TableName::WorkspaceInfo, "same", Box::new(|_: Option<&Value>| Some(json!("info"))))
            .unwrap();
        store
            .update_entry(TableName::Misc, "same", Box::new(|_: Option<&Value>| Some(json!("misc"))))
            .unwrap();

        assert_eq!(store.get_entry(TableName::WorkspaceInfo, "same").unwrap(), Some(json!("info")));
        assert_eq!(store.get_entry(TableName::Misc, "same").unwrap(), Some(json!("misc")));
        assert_eq!(store.get_entry(TableName::Sync, "same").unwrap(), None);
        assert!(store.get_all_entries(TableName::Sync).unwrap().is_empty());
    }
}

#[test]
fn test_delete_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();

    for store in backends(&temp_dir) {
        increment(store.as_ref(), "k");
        // Only the call that removed the entry reports it
        assert!(store.delete_entry(TableName::Misc, "k").unwrap());
        assert!(!store.delete_entry(TableName::Misc, "k").unwrap());
        assert!(!store.delete_entry(TableName::Misc, "never-existed").unwrap());

        assert_eq!(store.get_entry(TableName::Misc, "k").unwrap(), None);
    }
}

// =============================================================================
// Change feed
// =============================================================================

#[test]
fn test_change_feed_delivers_to_writer_and_peers() {
    let temp_dir = TempDir::new().unwrap();
    let transport: Arc<dyn BroadcastTransport> = Arc::new(InProcessTransport::new());
    let dir = temp_dir.path().join("shared");
    let tab_a = FileTableStore::open(&dir, "feed", transport.clone()).unwrap();
    let tab_b = FileTableStore::open(&dir, "feed", transport).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    for (label, store) in [("a", &tab_a), ("b", &tab_b)] {
        let sink = seen.clone();
        store
            .subscribe(
                TableName::Misc,
                Arc::new(move |message: BroadcastMessage<TableChange>| {
                    sink.lock().unwrap().push((label, message.is_self, message.data.kind));
                }),
                CancellationToken::new(),
            )
            .unwrap();
    }

    increment(&tab_a, "k");

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_by_key(|(label, _, _)| *label);
    assert_eq!(
        seen,
        vec![("a", true, ChangeKind::Create), ("b", false, ChangeKind::Create)]
    );
    assert_eq!(tab_b.get_entry(TableName::Misc, "k").unwrap(), Some(json!(1)));
}

#[test]
fn test_cancelled_subscription_stops() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileTableStore::open(temp_dir.path(), "feed", Arc::new(InProcessTransport::new())).unwrap();

    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    let cancel = CancellationToken::new();
    store
        .subscribe(
            TableName::Misc,
            Arc::new(move |_: BroadcastMessage<TableChange>| *sink.lock().unwrap() += 1),
            cancel.clone(),
        )
        .unwrap();

    increment(&store, "k");
    cancel.cancel();
    increment(&store, "k");

    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn test_memory_store_has_no_feed() {
    let store = MemoryTableStore::new();
    let result = store.subscribe(TableName::Misc, Arc::new(|_: BroadcastMessage<TableChange>| {}), CancellationToken::new());

    assert!(matches!(result, Err(TableStoreError::SubscribeUnsupported("memory"))));
}

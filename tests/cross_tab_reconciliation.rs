//! Cross-Tab Reconciliation Tests
//!
//! Two sessions share one data directory, like two tabs of the same origin.
//! They share either one in-process transport or a broadcast directory with
//! a native transport each, the way separate processes would. A write made
//! in one tab must surface in the other as exactly one external change on an
//! open note.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use notecore::broadcast::{BroadcastMessage, BroadcastTransport, InProcessTransport, NativeTransport};
use notecore::config::{CoreConfig, TableBackend};
use notecore::file_sha::{calculate_git_file_sha, DiskShaReader, ExternalChangeKind, FileShaTracker};
use notecore::file_storage::{FileChangeEvent, FileStorageResult, WsPath};
use notecore::workspace::WorkspaceManager;
use notecore::session::TabSession;
use notecore::table_store::{TableChange, TableName};
use notecore::workspace_db::WorkspaceType;
use serde_json::Map;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Utilities
// =============================================================================

fn tab_config(temp_dir: &TempDir) -> CoreConfig {
    let mut config = CoreConfig::new(temp_dir.path().join("data"));
    config.table_backend = TableBackend::File;
    config.reconcile_interval_ms = 10;
    config.reload_unblock_delay_ms = 20;
    config
}

fn two_tabs(temp_dir: &TempDir, transport: Arc<dyn BroadcastTransport>) -> (TabSession, TabSession) {
    let config = tab_config(temp_dir);
    let tab_a = TabSession::open(config.clone(), transport.clone()).unwrap();
    let tab_b = TabSession::open(config, transport).unwrap();
    (tab_a, tab_b)
}

/// One session with its own native transport on the shared broadcast directory
fn native_tab(temp_dir: &TempDir) -> TabSession {
    let config = tab_config(temp_dir);
    let transport = NativeTransport::open(config.broadcast_dir())
        .unwrap()
        .with_poll_interval(Duration::from_millis(5));
    TabSession::open(config, Arc::new(transport)).unwrap()
}

fn path(raw: &str) -> WsPath {
    WsPath::parse(raw).unwrap()
}

// =============================================================================
// Reconciliation
// =============================================================================

#[test]
fn test_write_in_other_tab_reported_once() {
    let temp_dir = TempDir::new().unwrap();
    let (tab_a, tab_b) = two_tabs(&temp_dir, Arc::new(InProcessTransport::new()));
    let a = path("ws:a.md");

    tab_a
        .manager()
        .create_workspace("ws", WorkspaceType::Browser, Map::new())
        .unwrap();
    tab_a.notes().create_note(&a, "original").unwrap();

    // Tab A opens the note; the first pass only records the disk hash
    assert_eq!(tab_a.notes().open_note(&a).unwrap().as_deref(), Some("original"));
    assert!(tab_a.tracker().run_pass().changes.is_empty());
    assert_eq!(
        tab_a.tracker().opened_file(&a).unwrap().last_known_disk_sha,
        Some(calculate_git_file_sha(b"original"))
    );

    // Tab B writes the same note
    tab_b.notes().write_note(&a, "from tab b").unwrap();

    let report = tab_a.tracker().run_pass();
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].kind, ExternalChangeKind::Modified);
    assert_eq!(
        tab_a.tracker().opened_file(&a).unwrap().current_disk_sha(),
        Some(calculate_git_file_sha(b"from tab b").as_str())
    );

    // No duplicate on the next pass
    assert!(tab_a.tracker().run_pass().changes.is_empty());

    // The editor reloads and agrees with disk again
    assert_eq!(tab_a.notes().reload_note(&a).unwrap().as_deref(), Some("from tab b"));
    let tracked = tab_a.tracker().opened_file(&a).unwrap();
    assert_eq!(tracked.sha, tracked.last_known_disk_sha);
}

#[test]
fn test_delete_in_other_tab_reported() {
    let temp_dir = TempDir::new().unwrap();
    let (tab_a, tab_b) = two_tabs(&temp_dir, Arc::new(InProcessTransport::new()));
    let a = path("ws:a.md");

    tab_a
        .manager()
        .create_workspace("ws", WorkspaceType::Browser, Map::new())
        .unwrap();
    tab_a.notes().create_note(&a, "doomed").unwrap();
    tab_a.notes().open_note(&a).unwrap();
    tab_a.tracker().run_pass();

    tab_b
        .manager()
        .require_workspace("ws")
        .unwrap()
        .delete_file(&a)
        .unwrap();

    let report = tab_a.tracker().run_pass();
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].kind, ExternalChangeKind::Deleted);
    assert_eq!(report.changes[0].disk_sha, None);
}

#[test]
fn test_own_writes_are_not_external() {
    let temp_dir = TempDir::new().unwrap();
    let (tab_a, _tab_b) = two_tabs(&temp_dir, Arc::new(InProcessTransport::new()));
    let a = path("ws:a.md");

    tab_a
        .manager()
        .create_workspace("ws", WorkspaceType::Browser, Map::new())
        .unwrap();
    tab_a.notes().create_note(&a, "v1").unwrap();
    tab_a.notes().open_note(&a).unwrap();
    tab_a.tracker().run_pass();

    for text in ["v2", "v3", "v4"] {
        tab_a.notes().write_note(&a, text).unwrap();
        assert!(tab_a.tracker().run_pass().changes.is_empty());
    }
}

#[test]
fn test_workspace_created_in_other_tab_is_hinted() {
    let temp_dir = TempDir::new().unwrap();
    let (tab_a, tab_b) = two_tabs(&temp_dir, Arc::new(InProcessTransport::new()));

    let hints = Arc::new(Mutex::new(Vec::new()));
    let sink = hints.clone();
    tab_b
        .database()
        .watch(
            TableName::WorkspaceInfo,
            Arc::new(move |message: BroadcastMessage<TableChange>| {
                sink.lock().unwrap().push(message.data.key);
            }),
            CancellationToken::new(),
        )
        .unwrap();

    tab_a
        .manager()
        .create_workspace("fresh", WorkspaceType::Browser, Map::new())
        .unwrap();

    assert_eq!(*hints.lock().unwrap(), vec!["fresh".to_string()]);
    assert!(tab_b.manager().open_workspace("fresh").unwrap().is_some());
}

// =============================================================================
// Background reconciler
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_reconciler_delivers_change() {
    let temp_dir = TempDir::new().unwrap();
    let (tab_a, tab_b) = (native_tab(&temp_dir), native_tab(&temp_dir));
    let a = path("ws:a.md");

    tab_a
        .manager()
        .create_workspace("ws", WorkspaceType::Browser, Map::new())
        .unwrap();
    tab_a.notes().create_note(&a, "start").unwrap();
    tab_a.notes().open_note(&a).unwrap();
    let mut changes = tab_a.notes().take_external_changes().unwrap();

    let cancel = CancellationToken::new();
    let reconciler = tab_a.spawn_reconciler(cancel.clone());

    // Let at least one pass record the initial hash
    tokio::time::sleep(Duration::from_millis(50)).await;
    tab_b.notes().write_note(&a, "changed elsewhere").unwrap();

    let change = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("no external change within timeout")
        .expect("channel closed");
    assert_eq!(change.ws_path, a);
    assert_eq!(change.disk_sha, Some(calculate_git_file_sha(b"changed elsewhere")));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), reconciler)
        .await
        .unwrap()
        .unwrap();
}

#[test]
fn test_reload_gate_waits_for_quiet_period() {
    let temp_dir = TempDir::new().unwrap();
    let (tab_a, _tab_b) = two_tabs(&temp_dir, Arc::new(InProcessTransport::new()));
    let a = path("ws:a.md");

    tab_a
        .manager()
        .create_workspace("ws", WorkspaceType::Browser, Map::new())
        .unwrap();
    tab_a.notes().create_note(&a, "x").unwrap();
    tab_a.notes().open_note(&a).unwrap();

    assert!(!tab_a.tracker().is_reload_blocked());
    assert!(tab_a.tracker().begin_write(&a));
    assert!(tab_a.tracker().is_reload_blocked());

    tab_a.tracker().finish_write(&a, calculate_git_file_sha(b"x"));
    assert!(tab_a.tracker().is_reload_blocked());

    std::thread::sleep(Duration::from_millis(40));
    assert!(!tab_a.tracker().is_reload_blocked());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reload_signal_follows_writes() {
    let temp_dir = TempDir::new().unwrap();
    let (tab_a, _tab_b) = two_tabs(&temp_dir, Arc::new(InProcessTransport::new()));
    let a = path("ws:a.md");

    tab_a
        .manager()
        .create_workspace("ws", WorkspaceType::Browser, Map::new())
        .unwrap();
    tab_a.notes().create_note(&a, "x").unwrap();
    tab_a.notes().open_note(&a).unwrap();

    let mut blocked = tab_a.subscribe_reload_blocked();
    let cancel = CancellationToken::new();
    let reconciler = tab_a.spawn_reconciler(cancel.clone());

    assert!(tab_a.tracker().begin_write(&a));
    tokio::time::timeout(Duration::from_secs(5), blocked.wait_for(|b| *b))
        .await
        .unwrap()
        .unwrap();

    tab_a.tracker().finish_write(&a, calculate_git_file_sha(b"x"));
    tokio::time::timeout(Duration::from_secs(5), blocked.wait_for(|b| !*b))
        .await
        .unwrap()
        .unwrap();

    cancel.cancel();
    reconciler.await.unwrap();
}

// =============================================================================
// Writes racing a pass
// =============================================================================

/// Reads through the manager, but lands a tab write between reading the
/// disk and handing the hash back to the tracker
#[derive(Debug)]
struct WriteDuringRead {
    manager: Arc<WorkspaceManager>,
    tracker: OnceLock<Weak<FileShaTracker>>,
    reads: AtomicUsize,
}

impl DiskShaReader for WriteDuringRead {
    fn read_disk_sha(&self, path: &WsPath) -> FileStorageResult<Option<String>> {
        let sha = self.manager.read_disk_sha(path)?;
        if self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
            if let Some(tracker) = self.tracker.get().and_then(Weak::upgrade) {
                assert!(tracker.begin_write(path));
                self.manager
                    .require_workspace(path.ws_name())
                    .unwrap()
                    .write_file(path, b"saved mid-read")
                    .unwrap();
                tracker.finish_write(path, calculate_git_file_sha(b"saved mid-read"));
            }
        }
        Ok(sha)
    }
}

#[test]
fn test_pass_overlapping_own_write_reports_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (tab_a, _tab_b) = two_tabs(&temp_dir, Arc::new(InProcessTransport::new()));
    let a = path("ws:a.md");
    tab_a
        .manager()
        .create_workspace("ws", WorkspaceType::Browser, Map::new())
        .unwrap();
    tab_a.notes().create_note(&a, "before").unwrap();

    let reader = Arc::new(WriteDuringRead {
        manager: tab_a.manager().clone(),
        tracker: OnceLock::new(),
        reads: AtomicUsize::new(0),
    });
    let (tracker, _changes) = FileShaTracker::new(reader.clone(), Duration::from_millis(20));
    reader.tracker.set(Arc::downgrade(&tracker)).unwrap();
    tracker.open_file(&a, Some(calculate_git_file_sha(b"before")));

    assert!(tracker.run_pass().changes.is_empty());

    // The read returns the hash of "before" after our save landed
    let report = tracker.run_pass();
    assert!(report.changes.is_empty());
    assert_eq!(report.stale, 1);

    // The next pass sees our own content and stays quiet
    let report = tracker.run_pass();
    assert!(report.changes.is_empty());
    assert_eq!(report.stale, 0);
    let file = tracker.opened_file(&a).unwrap();
    assert_eq!(file.sha, file.last_known_disk_sha);
    assert_eq!(file.sha, Some(calculate_git_file_sha(b"saved mid-read")));
}

// =============================================================================
// Native transport between processes
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_native_hints_cross_transport_instances() {
    let temp_dir = TempDir::new().unwrap();
    let tab_a = native_tab(&temp_dir);
    let tab_b = native_tab(&temp_dir);

    let (ws_tx, mut ws_rx) = tokio::sync::mpsc::unbounded_channel();
    tab_b
        .database()
        .watch(
            TableName::WorkspaceInfo,
            Arc::new(move |message: BroadcastMessage<TableChange>| {
                let _ = ws_tx.send((message.is_self, message.data.key));
            }),
            CancellationToken::new(),
        )
        .unwrap();

    let (file_tx, mut file_rx) = tokio::sync::mpsc::unbounded_channel();
    tab_b
        .subscribe_file_changes(
            move |message: BroadcastMessage<FileChangeEvent>| {
                let _ = file_tx.send((message.is_self, message.data));
            },
            CancellationToken::new(),
        )
        .unwrap();

    tab_a
        .manager()
        .create_workspace("shared", WorkspaceType::Browser, Map::new())
        .unwrap();
    let a = path("shared:a.md");
    tab_a.notes().create_note(&a, "hello").unwrap();

    let (is_self, key) = tokio::time::timeout(Duration::from_secs(5), ws_rx.recv())
        .await
        .expect("no workspace hint within timeout")
        .unwrap();
    assert!(!is_self);
    assert_eq!(key, "shared");

    let (is_self, event) = tokio::time::timeout(Duration::from_secs(5), file_rx.recv())
        .await
        .expect("no file hint within timeout")
        .unwrap();
    assert!(!is_self);
    assert_eq!(event, FileChangeEvent::Create { ws_path: a.clone() });

    // The hint points at state tab B can already read
    let ws = tab_b.manager().require_workspace("shared").unwrap();
    assert_eq!(ws.read_file_as_text(&a).unwrap().as_deref(), Some("hello"));
}

//! # File-Sha Tracker
//!
//! Keeps the hash of every open file and polls storage for changes made
//! outside this context. Passes never overlap; a pass that finds one running
//! returns immediately.
//!
//! Storage is read without the tracking lock. An observation is dropped if
//! one of our own writes to that file started or landed during the read,
//! since the hash read may predate the write.
//!
//! Reload-block transitions are published on a `watch` channel. The
//! reconciler task also fires the delayed unblock, so subscribers never
//! have to poll.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::opened::{DiskState, ExternalChange, OpenedFile};
use super::reader::DiskShaReader;
use super::reload_gate::ReloadGate;
use crate::file_storage::WsPath;
use crate::observability::{log_event_with_fields, Event};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Another pass was running, nothing was done
    pub skipped: bool,
    pub checked: usize,
    pub failed: usize,
    /// Observations dropped because our own write overlapped the read
    pub stale: usize,
    pub changes: Vec<ExternalChange>,
}

struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct FileShaTracker {
    reader: Arc<dyn DiskShaReader>,
    files: Mutex<BTreeMap<WsPath, OpenedFile>>,
    pass_in_flight: AtomicBool,
    gate: Mutex<ReloadGate>,
    gate_changed: Notify,
    reload_blocked: watch::Sender<bool>,
    changes: mpsc::UnboundedSender<ExternalChange>,
}

impl FileShaTracker {
    /// Create a tracker and the receiver its external changes are sent to
    pub fn new(
        reader: Arc<dyn DiskShaReader>,
        reload_unblock_delay: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ExternalChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracker = Self {
            reader,
            files: Mutex::new(BTreeMap::new()),
            pass_in_flight: AtomicBool::new(false),
            gate: Mutex::new(ReloadGate::new(reload_unblock_delay)),
            gate_changed: Notify::new(),
            reload_blocked: watch::channel(false).0,
            changes: tx,
        };
        (Arc::new(tracker), rx)
    }

    // Tracking state stays usable after a panicking holder
    fn files(&self) -> MutexGuard<'_, BTreeMap<WsPath, OpenedFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================
    // Open / close
    // ==================

    /// Open `path`, or bump its open count. `sha` is the editor's content hash.
    pub fn open_file(&self, path: &WsPath, sha: Option<String>) {
        let mut files = self.files();
        match files.get_mut(path) {
            Some(file) => {
                file.open_count += 1;
                file.close_pending = false;
                if sha.is_some() {
                    file.sha = sha;
                }
            }
            None => {
                files.insert(path.clone(), OpenedFile::new(path.clone(), sha));
            }
        }
    }

    /// Drop one open reference. With a write in flight the record stays until it settles.
    pub fn close_file(&self, path: &WsPath) {
        let mut files = self.files();
        let Some(file) = files.get_mut(path) else {
            return;
        };

        file.open_count = file.open_count.saturating_sub(1);
        if file.is_released() {
            files.remove(path);
        } else if file.open_count == 0 {
            file.close_pending = true;
        }
    }

    pub fn is_open(&self, path: &WsPath) -> bool {
        self.files().get(path).map(|f| f.open_count > 0).unwrap_or(false)
    }

    /// Snapshot of one tracked file
    pub fn opened_file(&self, path: &WsPath) -> Option<OpenedFile> {
        self.files().get(path).cloned()
    }

    pub fn open_paths(&self) -> Vec<WsPath> {
        self.files().keys().cloned().collect()
    }

    // ==================
    // Writes
    // ==================

    /// Mark a write to `path` as started. Returns `false` if the file is not tracked.
    pub fn begin_write(&self, path: &WsPath) -> bool {
        let tracked = {
            let mut files = self.files();
            match files.get_mut(path) {
                Some(file) => {
                    file.start_write();
                    true
                }
                None => false,
            }
        };

        if tracked {
            self.refresh_gate();
        }
        tracked
    }

    /// The write landed; `sha` is the hash of the content written
    pub fn finish_write(&self, path: &WsPath, sha: String) {
        {
            let mut files = self.files();
            if let Some(file) = files.get_mut(path) {
                file.settle_write(sha);
                if file.close_pending && file.is_released() {
                    files.remove(path);
                }
            }
        }
        self.refresh_gate();
    }

    /// The write failed; disk state is left to the next pass
    pub fn fail_write(&self, path: &WsPath) {
        {
            let mut files = self.files();
            if let Some(file) = files.get_mut(path) {
                file.abandon_write();
                if file.close_pending && file.is_released() {
                    files.remove(path);
                }
            }
        }
        self.refresh_gate();
    }

    /// The editor's content changed without a write
    pub fn record_memory_sha(&self, path: &WsPath, sha: String) {
        if let Some(file) = self.files().get_mut(path) {
            file.sha = Some(sha);
        }
    }

    /// The editor reloaded from disk: adopt the current disk hash.
    ///
    /// Returns the adopted hash, `None` if the file is untracked or gone.
    pub fn acknowledge_external_change(&self, path: &WsPath) -> Option<String> {
        let mut files = self.files();
        let file = files.get_mut(path)?;

        let disk_sha = file.current_disk_sha().map(str::to_string);
        file.sha = disk_sha.clone();
        file.last_known_disk_sha = disk_sha.clone();
        disk_sha
    }

    // ==================
    // Reload gate
    // ==================

    /// Whether a page reload should be held back right now
    pub fn is_reload_blocked(&self) -> bool {
        self.refresh_gate()
    }

    /// Follow reload-block transitions. The delayed unblock is delivered
    /// while the reconciler task runs.
    pub fn subscribe_reload_blocked(&self) -> watch::Receiver<bool> {
        self.reload_blocked.subscribe()
    }

    fn gate(&self) -> MutexGuard<'_, ReloadGate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh_gate(&self) -> bool {
        let any_pending = self.files().values().any(OpenedFile::has_pending_write);
        let blocked = self.gate().observe(any_pending, Instant::now());

        self.reload_blocked.send_if_modified(|current| {
            if *current == blocked {
                return false;
            }
            *current = blocked;
            true
        });
        self.gate_changed.notify_one();
        blocked
    }

    // ==================
    // Reconciliation
    // ==================

    /// Compare every open file against storage.
    ///
    /// Read failures are logged and leave the previous observation in place.
    pub fn run_pass(&self) -> PassReport {
        if self
            .pass_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log_event_with_fields(Event::ReconcilePassSkipped, &[]);
            return PassReport {
                skipped: true,
                ..PassReport::default()
            };
        }
        let _guard = PassGuard(&self.pass_in_flight);

        let generations: Vec<(WsPath, u64)> = self
            .files()
            .iter()
            .map(|(path, file)| (path.clone(), file.write_generation))
            .collect();

        let mut report = PassReport::default();
        for (path, generation) in generations {
            // Storage is read without holding the tracking lock
            let observed = match self.reader.read_disk_sha(&path) {
                Ok(Some(sha)) => DiskState::Present(sha),
                Ok(None) => DiskState::Missing,
                Err(e) => {
                    log_event_with_fields(
                        Event::FileShaReadFailed,
                        &[("ws_path", path.as_str()), ("error", e.to_string().as_str())],
                    );
                    report.failed += 1;
                    continue;
                }
            };

            let change = match self.files().get_mut(&path) {
                Some(file) if file.write_generation == generation => file.observe(observed),
                Some(_) => {
                    report.stale += 1;
                    continue;
                }
                // Closed while we were reading
                None => continue,
            };
            report.checked += 1;

            if let Some(change) = change {
                log_event_with_fields(
                    Event::ExternalChangeDetected,
                    &[
                        ("ws_path", change.ws_path.as_str()),
                        ("disk_sha", change.disk_sha.as_deref().unwrap_or("deleted")),
                    ],
                );
                // Nobody listening is fine
                let _ = self.changes.send(change.clone());
                report.changes.push(change);
            }
        }

        self.refresh_gate();
        log_event_with_fields(
            Event::ReconcilePassComplete,
            &[
                ("checked", report.checked.to_string().as_str()),
                ("failed", report.failed.to_string().as_str()),
                ("changes", report.changes.len().to_string().as_str()),
            ],
        );
        report
    }

    /// Run a pass every `period` on the blocking pool until `cancel` fires.
    ///
    /// Missed ticks are skipped rather than bunched up. Between ticks the
    /// task waits for the reload gate's unblock deadline.
    pub fn spawn_reconciler(self: &Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let tracker = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let unblock_at = tracker.gate().unblock_deadline();
                let unblock = async move {
                    match unblock_at {
                        Some(at) => sleep_until(at.into()).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    _ = cancel.cancelled() => {
                        log_event_with_fields(Event::ReconcilerStopped, &[]);
                        break;
                    }
                    _ = tracker.gate_changed.notified() => {}
                    _ = unblock => {
                        tracker.refresh_gate();
                    }
                    _ = ticker.tick() => {
                        let tracker = Arc::clone(&tracker);
                        if let Err(e) = tokio::task::spawn_blocking(move || tracker.run_pass()).await {
                            log_event_with_fields(Event::ReconcilePassFailed, &[("error", e.to_string().as_str())]);
                        }
                    }
                }
            }
        })
    }
}

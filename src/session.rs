//! # Tab Session
//!
//! Everything one context (a browser tab, a CLI invocation) needs, wired
//! from configuration: table store, workspace database and manager, note
//! store with its tracker, and the cross-context file hint channel.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{BroadcastBus, BroadcastMessage, BroadcastResult, BroadcastTransport};
use crate::config::{CoreConfig, TableBackend};
use crate::file_sha::{FileShaTracker, NoteStore};
use crate::file_storage::{FileChangeCallback, FileChangeEvent};
use crate::observability::{log_event_with_fields, Event};
use crate::table_store::{FileTableStore, MemoryTableStore, QuotaTableStore, TableStore, TableStoreResult};
use crate::workspace::{WorkspaceManager, WorkspaceResult};
use crate::workspace_db::{WorkspaceDatabase, WorkspaceDbError};

pub struct TabSession {
    config: CoreConfig,
    store: Arc<dyn TableStore>,
    file_bus: Arc<BroadcastBus<FileChangeEvent>>,
    notes: NoteStore,
}

impl fmt::Debug for TabSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabSession")
            .field("service_name", &self.config.service_name)
            .field("store", &self.store.backend_name())
            .field("file_bus", &self.file_bus)
            .finish()
    }
}

fn open_store(
    config: &CoreConfig,
    transport: &Arc<dyn BroadcastTransport>,
) -> TableStoreResult<Arc<dyn TableStore>> {
    let store: Arc<dyn TableStore> = match config.table_backend {
        TableBackend::File => Arc::new(FileTableStore::open(
            config.tables_dir(),
            &config.service_name,
            transport.clone(),
        )?),
        TableBackend::Kv => Arc::new(QuotaTableStore::open(
            config.tables_dir(),
            &config.service_name,
            config.kv_quota_bytes,
            transport.clone(),
        )?),
        TableBackend::Memory => Arc::new(MemoryTableStore::new()),
    };
    Ok(store)
}

impl TabSession {
    /// Open a session. Sessions sharing `transport` see each other's hints.
    pub fn open(config: CoreConfig, transport: Arc<dyn BroadcastTransport>) -> WorkspaceResult<Self> {
        let store = open_store(&config, &transport).map_err(WorkspaceDbError::from)?;

        let file_bus = Arc::new(BroadcastBus::<FileChangeEvent>::new(
            format!("{}-files", config.service_name),
            transport.clone(),
        ));
        let publisher = file_bus.clone();
        // Send failures are logged by the bus
        let on_file_change: FileChangeCallback = Arc::new(move |event: &FileChangeEvent| {
            let _ = publisher.send(event);
        });

        let db = WorkspaceDatabase::new(store.clone());
        let manager = Arc::new(WorkspaceManager::new(
            db,
            config.files_dir(),
            &config.allowed_extensions,
            Some(on_file_change),
        ));
        let notes = NoteStore::new(manager, config.reload_unblock_delay());

        log_event_with_fields(
            Event::SessionOpened,
            &[
                ("service_name", config.service_name.as_str()),
                ("table_backend", store.backend_name()),
                ("transport", transport.name()),
            ],
        );

        Ok(Self {
            config,
            store,
            file_bus,
            notes,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    pub fn manager(&self) -> &Arc<WorkspaceManager> {
        self.notes.manager()
    }

    pub fn database(&self) -> &WorkspaceDatabase {
        self.notes.manager().database()
    }

    pub fn notes(&self) -> &NoteStore {
        &self.notes
    }

    pub fn tracker(&self) -> &Arc<FileShaTracker> {
        self.notes.tracker()
    }

    /// File mutations made by any session on the same transport, this one included
    pub fn subscribe_file_changes<F>(&self, handler: F, cancel: CancellationToken) -> BroadcastResult<()>
    where
        F: Fn(BroadcastMessage<FileChangeEvent>) + Send + Sync + 'static,
    {
        self.file_bus.subscribe(handler, cancel)
    }

    /// Reload-block signal for the UI: `true` while a reload would lose a write
    pub fn subscribe_reload_blocked(&self) -> watch::Receiver<bool> {
        self.tracker().subscribe_reload_blocked()
    }

    /// Start periodic reconciliation at the configured interval
    pub fn spawn_reconciler(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.tracker()
            .spawn_reconciler(self.config.reconcile_interval(), cancel)
    }
}

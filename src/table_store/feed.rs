//! Cross-context change feed shared by the durable backends.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::errors::TableStoreResult;
use super::table::{TableChange, TableChangeCallback, TableName};
use crate::broadcast::{BroadcastBus, BroadcastTransport};
use crate::observability::{log_event_with_fields, Event};

#[derive(Debug)]
pub(crate) struct ChangeFeed {
    bus: BroadcastBus<TableChange>,
}

impl ChangeFeed {
    /// One feed channel per store service name
    pub fn new(service_name: &str, transport: Arc<dyn BroadcastTransport>) -> Self {
        Self {
            bus: BroadcastBus::new(service_name, transport),
        }
    }

    /// Announce a committed change. The write already succeeded, so a
    /// publish failure is only logged.
    pub fn publish(&self, change: TableChange) {
        if let Err(e) = self.bus.send(&change) {
            log_event_with_fields(
                Event::TableChangePublishFailed,
                &[
                    ("channel", self.bus.channel()),
                    ("key", change.key.as_str()),
                    ("reason", e.to_string().as_str()),
                ],
            );
        }
    }

    pub fn subscribe(
        &self,
        table: TableName,
        callback: TableChangeCallback,
        cancel: CancellationToken,
    ) -> TableStoreResult<()> {
        self.bus.subscribe(
            move |message| {
                if message.data.table == table {
                    callback(message);
                }
            },
            cancel,
        )?;
        Ok(())
    }
}

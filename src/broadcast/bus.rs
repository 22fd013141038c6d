//! # Broadcast Bus
//!
//! Typed pub/sub over a [`BroadcastTransport`]. Every bus instance has its
//! own sender id; `is_self` is decided by the receiving bus, so a sender's
//! own subscribers see its messages with `is_self = true` on every transport.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::errors::{BroadcastError, BroadcastResult};
use super::message::{BroadcastMessage, Envelope};
use super::transport::{BroadcastTransport, RawListener};
use crate::observability::{log_event_with_fields, Event};

/// A typed channel endpoint owned by one context
pub struct BroadcastBus<T> {
    channel: String,
    sender_id: String,
    transport: Arc<dyn BroadcastTransport>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for BroadcastBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastBus")
            .field("channel", &self.channel)
            .field("sender_id", &self.sender_id)
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl<T> BroadcastBus<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// Open a bus endpoint on `channel` with a fresh sender id
    pub fn new(channel: impl Into<String>, transport: Arc<dyn BroadcastTransport>) -> Self {
        Self {
            channel: channel.into(),
            sender_id: Uuid::new_v4().to_string(),
            transport,
            _payload: PhantomData,
        }
    }

    /// Sender id stamped on outgoing messages
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Channel name
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish `data` to every context on the channel, this one included
    pub fn send(&self, data: &T) -> BroadcastResult<()> {
        let payload = serde_json::to_value(data).map_err(|e| {
            let reason = e.to_string();
            log_event_with_fields(
                Event::BroadcastSendFailed,
                &[("channel", self.channel.as_str()), ("reason", reason.as_str())],
            );
            BroadcastError::Serialization(reason)
        })?;

        let message = Envelope::new(self.sender_id.clone(), payload).into_value()?;
        self.transport.post(&self.channel, message)
    }

    /// Deliver every valid message to `handler` until `cancel` fires.
    ///
    /// Malformed messages are logged and dropped before reaching the handler.
    pub fn subscribe<F>(&self, handler: F, cancel: CancellationToken) -> BroadcastResult<()>
    where
        F: Fn(BroadcastMessage<T>) + Send + Sync + 'static,
    {
        let own_sender_id = self.sender_id.clone();
        let channel = self.channel.clone();

        let listener: RawListener = Arc::new(move |raw: Value| {
            match decode::<T>(&raw, &own_sender_id) {
                Ok(message) => handler(message),
                Err(e) => log_event_with_fields(
                    Event::BroadcastMessageDropped,
                    &[("channel", channel.as_str()), ("reason", e.to_string().as_str())],
                ),
            }
        });

        self.transport.listen(&self.channel, listener, cancel)
    }
}

fn decode<T: DeserializeOwned>(raw: &Value, own_sender_id: &str) -> BroadcastResult<BroadcastMessage<T>> {
    let envelope = Envelope::parse(raw)?;
    let data = serde_json::from_value::<T>(envelope.data)
        .map_err(|e| BroadcastError::InvalidMessage(format!("payload: {}", e)))?;

    Ok(BroadcastMessage {
        is_self: envelope.sender_id == own_sender_id,
        sender_id: envelope.sender_id,
        data,
        timestamp: envelope.timestamp,
    })
}

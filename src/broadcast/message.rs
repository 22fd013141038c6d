//! # Broadcast Messages
//!
//! Wire envelope shared by every transport, and the typed message handed to
//! subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{BroadcastError, BroadcastResult};

/// A message as seen by one subscriber
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastMessage<T> {
    /// Sender id of the bus that sent the message
    pub sender_id: String,
    /// Payload
    pub data: T,
    /// Send time, stamped by the sender
    pub timestamp: DateTime<Utc>,
    /// True when the receiving bus is the one that sent the message
    pub is_self: bool,
}

/// On-the-wire form of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    pub sender_id: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(sender_id: String, data: Value) -> Self {
        Self {
            sender_id,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn into_value(self) -> BroadcastResult<Value> {
        serde_json::to_value(self).map_err(|e| BroadcastError::Serialization(e.to_string()))
    }

    /// Validate a raw message received from a transport.
    ///
    /// The sender id and the `data` field are required. A missing or
    /// malformed timestamp falls back to the receive time.
    pub fn parse(raw: &Value) -> BroadcastResult<Self> {
        let object = raw
            .as_object()
            .ok_or_else(|| BroadcastError::InvalidMessage("message is not an object".into()))?;

        let sender_id = object
            .get("senderId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BroadcastError::InvalidMessage("missing senderId".into()))?
            .to_string();

        let data = object
            .get("data")
            .cloned()
            .ok_or_else(|| BroadcastError::InvalidMessage("missing data".into()))?;

        let timestamp = object
            .get("timestamp")
            .and_then(|t| serde_json::from_value::<DateTime<Utc>>(t.clone()).ok())
            .unwrap_or_else(Utc::now);

        Ok(Self {
            sender_id,
            data,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_shape() {
        let value = Envelope::new("tab-1".into(), json!({"k": 1}))
            .into_value()
            .unwrap();

        assert_eq!(value["senderId"], "tab-1");
        assert_eq!(value["data"]["k"], 1);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_parse_rejects_missing_sender() {
        let result = Envelope::parse(&json!({"data": 1}));
        assert!(matches!(result, Err(BroadcastError::InvalidMessage(_))));

        let result = Envelope::parse(&json!({"senderId": "", "data": 1}));
        assert!(matches!(result, Err(BroadcastError::InvalidMessage(_))));
    }

    #[test]
    fn test_parse_rejects_missing_data() {
        let result = Envelope::parse(&json!({"senderId": "tab-1"}));
        assert!(matches!(result, Err(BroadcastError::InvalidMessage(_))));
    }

    #[test]
    fn test_parse_tolerates_bad_timestamp() {
        let envelope = Envelope::parse(&json!({
            "senderId": "tab-1",
            "data": null,
            "timestamp": "yesterday"
        }))
        .unwrap();

        assert_eq!(envelope.sender_id, "tab-1");
        assert!(envelope.data.is_null());
    }
}

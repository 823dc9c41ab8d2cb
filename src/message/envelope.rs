//! Message envelope
//!
//! The envelope is the per-message unit handed to a handler. The body of every
//! message is a JSON object of the form
//!
//! ```json
//! { "replyTo": "orders.replies", "payload": { "id": 42 } }
//! ```
//!
//! `replyTo` may be omitted (or empty) when no reply is expected, and `payload`
//! defaults to `null`. Anything that is not a JSON object is a decode error.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::RawMessage;

/// JSON wire format of a message body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeBody {
    #[serde(rename = "replyTo", default, skip_serializing_if = "String::is_empty")]
    pub reply_to: String,
    #[serde(default)]
    pub payload: Value,
}

impl EnvelopeBody {
    pub fn new(payload: Value) -> Self {
        Self {
            reply_to: String::new(),
            payload,
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = reply_to.into();
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A decoded message, as seen by a handler.
///
/// The transport-derived fields (`id`, `timestamp`, `attempts`) are carried
/// over untouched from the [`RawMessage`]; `body` keeps the original bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: String,
    pub timestamp: i64,
    pub attempts: u16,
    pub body: Vec<u8>,
    pub reply_to: String,
    pub payload: Value,
}

impl Envelope {
    /// Parses the body of `message`.
    pub fn decode(message: &RawMessage) -> Result<Self, serde_json::Error> {
        let EnvelopeBody { reply_to, payload } = serde_json::from_slice(&message.body)?;

        Ok(Self {
            id: message.id.clone(),
            timestamp: message.timestamp,
            attempts: message.attempts,
            body: message.body.clone(),
            reply_to,
            payload,
        })
    }

    /// Whether the sender asked for the handler's result to be published back.
    pub fn expects_reply(&self) -> bool {
        !self.reply_to.is_empty()
    }

    /// Deserializes the payload into `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp)
    }
}

use uuid::Uuid;

/// A message as delivered by a transport, before any decoding.
///
/// # Fields
///
/// - `id` - Transport-assigned message id.
/// - `timestamp` - Nanoseconds since the UNIX epoch at which the message was published.
/// - `attempts` - Delivery attempt count, starting at 1.
/// - `body` - Opaque payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub timestamp: i64,
    pub attempts: u16,
    pub body: Vec<u8>,
}

impl RawMessage {
    /// Stamps a fresh id and the current time on `body`.
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            attempts: 1,
            body,
        }
    }

    /// Copy of this message for its next delivery attempt.
    pub fn redelivery(&self) -> Self {
        Self {
            attempts: self.attempts.saturating_add(1),
            ..self.clone()
        }
    }
}

//! The `emitter` module is the publishing side used to send replies.
//!
//! [`Emitter`] is the seam the dispatcher publishes through; [`HttpEmitter`]
//! is the default implementation, talking to a broker's HTTP publish endpoint.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::utils::error::EmitError;

pub use self::http::{EmitterConfig, HttpEmitter};

/// Publishes a payload to a topic.
///
/// Fire-and-forget: the only delivery signal is the returned `Result`.
#[async_trait]
pub trait Emitter: Send + Sync {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), EmitError>;
}

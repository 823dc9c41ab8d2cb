//! The `transport` module is the seam between this crate and the messaging
//! substrate that actually moves messages.
//!
//! A transport creates a [`Consumer`] per (topic, channel), runs registered
//! [`MessageHandler`]s on a pool of workers of the requested size, and owns the
//! redelivery policy for messages whose handler returned an error.
//!
//! Two transports ship with the crate:
//! - [`NsqConsumerFactory`] subscribes on nsqd nodes found through nsqlookupd,
//!   speaking the nsqd TCP protocol (`protocol`).
//! - [`InMemoryBroker`] is a process-local transport with the same channel
//!   semantics: every channel of a topic receives a full copy of each message,
//!   and consumers sharing a channel load-balance its messages.

pub mod in_memory;
pub mod nsq;
pub mod protocol;

use std::sync::Arc;

use async_trait::async_trait;

use crate::message::RawMessage;
use crate::utils::error::{DispatchError, TransportError};

pub use in_memory::{InMemoryBroker, InMemoryConsumer};
pub use nsq::{NsqConfig, NsqConsumer, NsqConsumerFactory};

/// Default number of delivery attempts before a transport gives up on a message.
pub const DEFAULT_MAX_ATTEMPTS: u16 = 5;

const MAX_NAME_LEN: usize = 64;
const EPHEMERAL_SUFFIX: &str = "#ephemeral";

/// Callback a transport invokes once per delivered message.
///
/// An `Err` tells the transport the message was not processed; what happens
/// next (requeue, backoff, give up) is the transport's decision.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: &RawMessage) -> Result<(), DispatchError>;
}

/// A subscription to one (topic, channel) pair.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Registers `handler` to run on `concurrency` parallel workers.
    fn add_concurrent_handlers(&mut self, handler: Arc<dyn MessageHandler>, concurrency: usize);

    /// Starts delivery, discovering brokers through the given lookup addresses.
    async fn connect_to_lookupds(&mut self, addresses: &[String]) -> Result<(), TransportError>;
}

/// Per-consumer options handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    pub max_attempts: u16,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

pub trait ConsumerFactory: Send + Sync {
    fn new_consumer(
        &self,
        topic: &str,
        channel: &str,
        options: &ConsumerOptions,
    ) -> Result<Box<dyn Consumer>, TransportError>;
}

/// Topic and channel names: 1 to 64 characters of `[.a-zA-Z0-9_-]`,
/// optionally ending in `#ephemeral`.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    let base = name.strip_suffix(EPHEMERAL_SUFFIX).unwrap_or(name);
    !base.is_empty()
        && base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub fn validate_names(topic: &str, channel: &str) -> Result<(), TransportError> {
    if !is_valid_name(topic) {
        return Err(TransportError::InvalidTopicName(topic.to_string()));
    }
    if !is_valid_name(channel) {
        return Err(TransportError::InvalidChannelName(channel.to_string()));
    }
    Ok(())
}

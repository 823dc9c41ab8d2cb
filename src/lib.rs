//! # nsq_bus
//!
//! `nsq_bus` binds a processing function to a (topic, channel) pair on a
//! distributed publish/subscribe queue, runs it across a bounded pool of
//! concurrent workers, and completes request/reply cycles by publishing the
//! handler's result to the `replyTo` topic carried in the message.
//!
//! ## Core Modules
//!
//! - `listener`: `ListenerConfig` and `Listener::on`, the entry point.
//! - `provision`: creates a topic on the broker fleet if the discovery service does not know it.
//! - `discovery`: HTTP client for the discovery service and broker nodes.
//! - `dispatch`: the `Handler` contract and the adapter the transport calls per message.
//! - `message`: raw transport messages and the decoded `Envelope`.
//! - `emitter`: publishing replies.
//! - `transport`: the seam to the messaging substrate, with an nsqd TCP consumer and an in-memory broker.
//! - `config`: process settings for the binary.
//! - `utils`: error types and logging.
//!
//! ## Example
//!
//! Consuming from an NSQ fleet: the topic is created through nsqlookupd if it
//! is unknown, consumers connect to the nsqd nodes nsqlookupd reports, and
//! replies are published over nsqd's HTTP API (`localhost:4151` by default).
//!
//! ```no_run
//! use nsq_bus::{BoxError, Envelope, Listener, ListenerConfig, NsqConfig, NsqConsumerFactory};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = Listener::new(NsqConsumerFactory::new(NsqConfig::default())?)?;
//! listener
//!     .on(ListenerConfig::new("orders", "billing")
//!         .handler(|envelope: Envelope| async move {
//!             Ok::<_, BoxError>(json!({ "received": envelope.payload }))
//!         })
//!         .discovery_addresses(["nsqlookupd-1:4161", "nsqlookupd-2:4161"])
//!         .concurrency(4)
//!         .auto_create_topic(true))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! In-process, the broker is both the transport and the reply emitter:
//!
//! ```
//! use std::sync::Arc;
//!
//! use nsq_bus::{BoxError, Envelope, InMemoryBroker, Listener, ListenerConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = InMemoryBroker::new();
//! let listener = Listener::with_emitter(broker.clone(), Arc::new(broker.clone()));
//! listener
//!     .on(ListenerConfig::new("orders", "billing")
//!         .handler(|envelope: Envelope| async move { Ok::<_, BoxError>(envelope.payload) }))
//!     .await?;
//! assert_eq!(listener.subscriptions().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod emitter;
pub mod listener;
pub mod message;
pub mod provision;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::{Handler, HandlerResult};
pub use emitter::{Emitter, EmitterConfig, HttpEmitter};
pub use listener::{Listener, ListenerConfig};
pub use message::{Envelope, EnvelopeBody, RawMessage};
pub use transport::{
    Consumer, ConsumerFactory, ConsumerOptions, InMemoryBroker, MessageHandler, NsqConfig,
    NsqConsumerFactory,
};
pub use utils::error::{
    BoxError, BusError, DispatchError, EmitError, ProtocolError, ProvisionError, TransportError,
};

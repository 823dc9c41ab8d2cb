//! Listener façade
//!
//! Order of operations in [`Listener::on`]:
//! 1. validate + default the configuration (no I/O)
//! 2. if `auto_create_topic`, provision the topic via the first discovery address
//! 3. create a consumer, register the dispatcher at the requested concurrency
//! 4. connect the consumer to every discovery address
//!
//! Any error aborts `on` and is returned verbatim. The consumer is only kept
//! once step 4 succeeds, so a failed call leaves no subscription behind.
//! Nothing is retried here.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::discovery::DiscoveryClient;
use crate::dispatch::Dispatcher;
use crate::emitter::{Emitter, EmitterConfig, HttpEmitter};
use crate::listener::ListenerConfig;
use crate::provision::TopicProvisioner;
use crate::transport::{Consumer, ConsumerFactory};
use crate::utils::error::{BusError, EmitError};

struct Subscription {
    topic: String,
    channel: String,
    // held so the transport keeps delivering for the life of the listener
    _consumer: Box<dyn Consumer>,
}

/// Starts subscriptions on a transport.
///
/// Replies are published through the listener's [`Emitter`]: by default an
/// [`HttpEmitter`] built from `EmitterConfig::default()`, shared by every
/// subscription started here. Pair a non-nsqd transport with its own emitter
/// through [`Listener::with_emitter`], e.g.
/// `Listener::with_emitter(broker.clone(), Arc::new(broker))` for an
/// `InMemoryBroker`.
pub struct Listener<F: ConsumerFactory> {
    factory: F,
    emitter: Arc<dyn Emitter>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl<F: ConsumerFactory> Listener<F> {
    pub fn new(factory: F) -> Result<Self, EmitError> {
        let emitter = HttpEmitter::new(EmitterConfig::default())?;
        Ok(Self::with_emitter(factory, Arc::new(emitter)))
    }

    pub fn with_emitter(factory: F, emitter: Arc<dyn Emitter>) -> Self {
        Self {
            factory,
            emitter,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Starts consuming `config.topic` on `config.channel`.
    ///
    /// On `Ok` the subscription is connected and dispatching; on `Err` nothing
    /// was registered with the transport.
    pub async fn on(&self, config: ListenerConfig) -> Result<(), BusError> {
        let config = config.resolve()?;

        if config.auto_create_topic() {
            let provisioner = TopicProvisioner::new(DiscoveryClient::new(config.request_timeout())?);
            provisioner
                .ensure_topic(config.primary_discovery_address(), config.topic())
                .await?;
        }

        let mut consumer = self.factory.new_consumer(
            config.topic(),
            config.channel(),
            &config.consumer_options(),
        )?;

        let dispatcher = Dispatcher::new(config.handler(), self.emitter.clone());
        consumer.add_concurrent_handlers(Arc::new(dispatcher), config.concurrency());
        consumer
            .connect_to_lookupds(config.discovery_addresses())
            .await?;

        info!(
            topic = config.topic(),
            channel = config.channel(),
            concurrency = config.concurrency(),
            "listening"
        );

        self.lock().push(Subscription {
            topic: config.topic().to_string(),
            channel: config.channel().to_string(),
            _consumer: consumer,
        });
        Ok(())
    }

    /// The (topic, channel) pairs started by this listener.
    pub fn subscriptions(&self) -> Vec<(String, String)> {
        self.lock()
            .iter()
            .map(|s| (s.topic.clone(), s.channel.clone()))
            .collect()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

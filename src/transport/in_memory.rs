//! In-memory transport
//!
//! Layout:
//! - a topic fans each published message out to all of its channels
//! - a channel is one unbounded queue shared by every consumer worker on it
//! - messages published while a topic has no channel are held on the topic
//!   and handed to the first channel created
//!
//! Workers hold the queue's receiver lock only while waiting for the next
//! message, so up to `concurrency` handler calls run at once. A message whose
//! handler fails is requeued with its attempt count bumped until
//! `max_attempts`, then dropped with a warning.
//!
//! Dropping a consumer aborts its workers and puts every message they were
//! still handling back on the channel queue as a redelivery, so a message is
//! never lost to teardown (it may be handled twice).
//!
//! The broker keeps a bounded history of published messages for inspection
//! (`published`); the oldest entries are evicted past the history limit.
//!
//! The broker state lock is a plain `std::sync::Mutex` and is never held
//! across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::emitter::Emitter;
use crate::message::{EnvelopeBody, RawMessage};
use crate::transport::{
    Consumer, ConsumerFactory, ConsumerOptions, MessageHandler, is_valid_name, validate_names,
};
use crate::utils::error::{EmitError, TransportError};

#[derive(Clone)]
struct ChannelQueue {
    tx: mpsc::UnboundedSender<RawMessage>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<RawMessage>>>,
}

impl ChannelQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }

    fn push(&self, message: RawMessage) {
        if self.tx.send(message).is_err() {
            warn!("channel queue closed, message lost");
        }
    }
}

#[derive(Default)]
struct TopicState {
    channels: HashMap<String, ChannelQueue>,
    held: Vec<RawMessage>,
}

/// Published messages retained by [`InMemoryBroker::new`].
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

struct BrokerState {
    topics: HashMap<String, TopicState>,
    history: VecDeque<(String, RawMessage)>,
    history_limit: usize,
}

/// Process-local transport. Cloning shares the same topics.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker remembering at most `limit` published messages across all
    /// topics. `0` disables the history.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                topics: HashMap::new(),
                history: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
                history_limit: limit,
            })),
        }
    }

    /// Publishes raw `body` bytes to `topic`.
    pub fn publish_raw(&self, topic: &str, body: Vec<u8>) -> Result<RawMessage, TransportError> {
        if !is_valid_name(topic) {
            return Err(TransportError::InvalidTopicName(topic.to_string()));
        }

        let message = RawMessage::new(body);
        let mut state = self.lock();
        if state.history_limit > 0 {
            if state.history.len() == state.history_limit {
                state.history.pop_front();
            }
            state.history.push_back((topic.to_string(), message.clone()));
        }

        let topic_state = state.topics.entry(topic.to_string()).or_default();
        if topic_state.channels.is_empty() {
            topic_state.held.push(message.clone());
        } else {
            for queue in topic_state.channels.values() {
                queue.push(message.clone());
            }
        }

        debug!(topic, id = %message.id, "message published");
        Ok(message)
    }

    /// Retained messages published to `topic`, oldest first.
    pub fn published(&self, topic: &str) -> Vec<RawMessage> {
        self.lock()
            .history
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<_> = self.lock().topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn channels(&self, topic: &str) -> Vec<String> {
        let mut channels: Vec<_> = self
            .lock()
            .topics
            .get(topic)
            .map(|t| t.channels.keys().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// Gets the queue for (topic, channel), creating it on first use.
    fn queue(&self, topic: &str, channel: &str) -> ChannelQueue {
        let mut state = self.lock();
        let topic_state = state.topics.entry(topic.to_string()).or_default();

        if let Some(queue) = topic_state.channels.get(channel) {
            return queue.clone();
        }

        let queue = ChannelQueue::new();
        for message in topic_state.held.drain(..) {
            queue.push(message);
        }
        topic_state
            .channels
            .insert(channel.to_string(), queue.clone());
        queue
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        // state is never left half-updated, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConsumerFactory for InMemoryBroker {
    fn new_consumer(
        &self,
        topic: &str,
        channel: &str,
        options: &ConsumerOptions,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        validate_names(topic, channel)?;
        Ok(Box::new(InMemoryConsumer {
            broker: self.clone(),
            topic: topic.to_string(),
            channel: channel.to_string(),
            options: options.clone(),
            handlers: Vec::new(),
            workers: Vec::new(),
            queue: None,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }))
    }
}

#[async_trait]
impl Emitter for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), EmitError> {
        if topic.is_empty() {
            return Err(EmitError::TopicRequired);
        }
        let body = EnvelopeBody::new(payload.clone()).to_bytes()?;
        self.publish_raw(topic, body)
            .map(|_| ())
            .map_err(|e| EmitError::Rejected(e.to_string()))
    }
}

/// Messages taken off the queue and not yet settled, by id.
type InFlight = Arc<Mutex<HashMap<String, RawMessage>>>;

/// Consumer on an [`InMemoryBroker`]. Dropping it stops its workers and
/// requeues whatever they were handling.
pub struct InMemoryConsumer {
    broker: InMemoryBroker,
    topic: String,
    channel: String,
    options: ConsumerOptions,
    handlers: Vec<(Arc<dyn MessageHandler>, usize)>,
    workers: Vec<JoinHandle<()>>,
    queue: Option<ChannelQueue>,
    in_flight: InFlight,
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    fn add_concurrent_handlers(&mut self, handler: Arc<dyn MessageHandler>, concurrency: usize) {
        self.handlers.push((handler, concurrency.max(1)));
    }

    async fn connect_to_lookupds(&mut self, addresses: &[String]) -> Result<(), TransportError> {
        if addresses.is_empty() {
            return Err(TransportError::NoLookupAddresses);
        }
        if self.handlers.is_empty() {
            return Err(TransportError::NoHandlers);
        }
        if self.queue.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        let queue = self.broker.queue(&self.topic, &self.channel);
        for (handler, concurrency) in &self.handlers {
            for _ in 0..*concurrency {
                self.workers.push(tokio::spawn(run_worker(
                    queue.clone(),
                    handler.clone(),
                    self.in_flight.clone(),
                    self.options.max_attempts,
                )));
            }
        }
        self.queue = Some(queue);

        debug!(
            topic = %self.topic,
            channel = %self.channel,
            workers = self.workers.len(),
            "consumer connected"
        );
        Ok(())
    }
}

impl Drop for InMemoryConsumer {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }

        let Some(queue) = &self.queue else {
            return;
        };
        let unsettled: Vec<RawMessage> = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, message)| message)
            .collect();
        for message in unsettled {
            debug!(id = %message.id, "requeueing in-flight message on teardown");
            queue.push(message.redelivery());
        }
    }
}

async fn run_worker(
    queue: ChannelQueue,
    handler: Arc<dyn MessageHandler>,
    in_flight: InFlight,
    max_attempts: u16,
) {
    loop {
        let next = { queue.rx.lock().await.recv().await };
        let Some(message) = next else {
            return;
        };

        // no await between taking the message and recording it
        in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(message.id.clone(), message.clone());
        let outcome = handler.handle_message(&message).await;
        in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&message.id);

        match outcome {
            Ok(()) => debug!(id = %message.id, "message finished"),
            Err(err) if message.attempts >= max_attempts => {
                warn!(id = %message.id, attempts = message.attempts, %err, "giving up on message");
            }
            Err(err) => {
                debug!(id = %message.id, attempts = message.attempts, %err, "requeueing message");
                queue.push(message.redelivery());
            }
        }
    }
}

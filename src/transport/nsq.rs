//! nsqd TCP transport
//!
//! `connect_to_lookupds` asks every lookup address for the topic's producers
//! and opens one connection per producer. The lookups are then repeated every
//! `lookupd_poll_interval`, connecting to producers that appeared since and
//! reconnecting to ones whose connection ended. Lookup failures are logged and
//! retried on the next poll; they never fail `connect_to_lookupds`.
//!
//! Per connection: magic, `IDENTIFY`, `SUB`, then `RDY n` where `n` is the
//! consumer's total handler concurrency. Heartbeats are answered with `NOP`.
//! Delivered messages go to one queue shared by all handler workers, and each
//! worker acknowledges on the connection the message came from:
//! - handler `Ok`: `FIN`
//! - handler `Err` below `max_attempts`: `REQ` with a delay growing with the
//!   attempt count, capped at `max_requeue_delay`
//! - handler `Err` at `max_attempts`: `FIN` and a warning
//!
//! Dropping the consumer aborts every task and closes its connections; nsqd
//! redelivers whatever was in flight once the message timeout passes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::{BrokerNode, DiscoveryClient};
use crate::message::RawMessage;
use crate::transport::protocol::{CLOSE_WAIT, Command, Frame, HEARTBEAT, NsqCodec, OK};
use crate::transport::{
    Consumer, ConsumerFactory, ConsumerOptions, MessageHandler, validate_names,
};
use crate::utils::error::{ProtocolError, ProvisionError, TransportError};

pub const DEFAULT_LOOKUPD_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_secs(90);
pub const DEFAULT_MAX_REQUEUE_DELAY: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_NSQ_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings shared by every consumer a factory creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsqConfig {
    /// Bounds lookups, dialing nsqd and each handshake step.
    pub request_timeout: Duration,
    pub lookupd_poll_interval: Duration,
    /// Requeue delay for a first failure; multiplied by the attempt count.
    pub requeue_delay: Duration,
    pub max_requeue_delay: Duration,
    pub user_agent: String,
}

impl Default for NsqConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_NSQ_TIMEOUT,
            lookupd_poll_interval: DEFAULT_LOOKUPD_POLL_INTERVAL,
            requeue_delay: DEFAULT_REQUEUE_DELAY,
            max_requeue_delay: DEFAULT_MAX_REQUEUE_DELAY,
            user_agent: concat!("nsq_bus/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl NsqConfig {
    pub(crate) fn requeue_delay_ms(&self, attempts: u16) -> u64 {
        let delay = self
            .requeue_delay
            .saturating_mul(u32::from(attempts.max(1)))
            .min(self.max_requeue_delay);
        u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Creates consumers that subscribe on real nsqd nodes found through
/// nsqlookupd.
#[derive(Debug, Clone)]
pub struct NsqConsumerFactory {
    config: NsqConfig,
    discovery: DiscoveryClient,
}

impl NsqConsumerFactory {
    pub fn new(config: NsqConfig) -> Result<Self, ProvisionError> {
        let discovery = DiscoveryClient::new(config.request_timeout)?;
        Ok(Self { config, discovery })
    }

    pub fn config(&self) -> &NsqConfig {
        &self.config
    }
}

impl ConsumerFactory for NsqConsumerFactory {
    fn new_consumer(
        &self,
        topic: &str,
        channel: &str,
        options: &ConsumerOptions,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        validate_names(topic, channel)?;
        Ok(Box::new(NsqConsumer {
            topic: topic.to_string(),
            channel: channel.to_string(),
            options: options.clone(),
            config: self.config.clone(),
            discovery: self.discovery.clone(),
            handlers: Vec::new(),
            tasks: Vec::new(),
            session: None,
        }))
    }
}

struct Delivery {
    message: RawMessage,
    acks: mpsc::UnboundedSender<Command>,
}

type DeliveryQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>>;

/// State shared by the lookup poller and the connections it starts.
struct Session {
    topic: String,
    channel: String,
    config: NsqConfig,
    discovery: DiscoveryClient,
    ready: u32,
    deliveries: mpsc::UnboundedSender<Delivery>,
    connected: Mutex<HashSet<String>>,
    connections: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    async fn poll(self: &Arc<Self>, lookupds: &[String]) {
        for lookupd in lookupds {
            let producers = match self.discovery.producers(lookupd, &self.topic).await {
                Ok(producers) => producers,
                Err(err) => {
                    warn!(%lookupd, topic = %self.topic, %err, "lookup failed");
                    continue;
                }
            };
            for node in producers {
                self.connect(node);
            }
        }
    }

    fn connect(self: &Arc<Self>, node: BrokerNode) {
        let addr = node.to_string();
        if !lock(&self.connected).insert(addr.clone()) {
            return;
        }

        let session = self.clone();
        let handle = tokio::spawn(async move {
            match session.run_connection(&addr).await {
                Ok(()) => info!(%addr, "nsqd connection closed"),
                Err(err) => warn!(%addr, %err, "nsqd connection failed"),
            }
            lock(&session.connected).remove(&addr);
        });

        let mut connections = lock(&self.connections);
        connections.retain(|c| !c.is_finished());
        connections.push(handle);
    }

    async fn run_connection(&self, addr: &str) -> Result<(), ProtocolError> {
        let wait = self.config.request_timeout;
        let stream = timeout(wait, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        let mut framed = Framed::new(stream, NsqCodec);

        let identify = json!({
            "client_id": format!("nsq_bus-{}", Uuid::new_v4().simple()),
            "user_agent": self.config.user_agent,
            "feature_negotiation": false,
        });
        framed.send(Command::Magic).await?;
        framed
            .send(Command::Identify(serde_json::to_vec(&identify)?))
            .await?;
        expect_ok(&mut framed, wait).await?;

        framed
            .send(Command::Sub {
                topic: self.topic.clone(),
                channel: self.channel.clone(),
            })
            .await?;
        expect_ok(&mut framed, wait).await?;

        framed.send(Command::Rdy(self.ready)).await?;
        info!(%addr, topic = %self.topic, channel = %self.channel, ready = self.ready, "subscribed");

        let (acks, mut pending_acks) = mpsc::unbounded_channel();
        loop {
            tokio::select! {
                frame = framed.next() => match frame {
                    None => return Ok(()),
                    Some(frame) => match frame? {
                        Frame::Response(data) if data == HEARTBEAT => {
                            framed.send(Command::Nop).await?;
                        }
                        Frame::Response(data) if data == CLOSE_WAIT => return Ok(()),
                        Frame::Response(data) => {
                            debug!(%addr, response = %String::from_utf8_lossy(&data), "nsqd response");
                        }
                        Frame::Error(data) => {
                            warn!(%addr, error = %String::from_utf8_lossy(&data), "nsqd error");
                        }
                        Frame::Message(message) => {
                            let delivery = Delivery { message, acks: acks.clone() };
                            if self.deliveries.send(delivery).is_err() {
                                return Err(ProtocolError::Closed);
                            }
                        }
                    },
                },
                Some(ack) = pending_acks.recv() => framed.send(ack).await?,
            }
        }
    }
}

async fn expect_ok(
    framed: &mut Framed<TcpStream, NsqCodec>,
    wait: Duration,
) -> Result<(), ProtocolError> {
    let frame = timeout(wait, framed.next())
        .await
        .map_err(|_| ProtocolError::Timeout)?
        .ok_or(ProtocolError::Closed)??;

    match frame {
        Frame::Response(data) if data == OK => Ok(()),
        Frame::Response(data) => Err(ProtocolError::UnexpectedResponse(
            String::from_utf8_lossy(&data).into_owned(),
        )),
        Frame::Error(data) => Err(ProtocolError::Rejected(
            String::from_utf8_lossy(&data).into_owned(),
        )),
        Frame::Message(message) => Err(ProtocolError::UnexpectedResponse(format!(
            "message {} before subscribing",
            message.id
        ))),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Consumer subscribed on nsqd. Dropping it closes every connection.
pub struct NsqConsumer {
    topic: String,
    channel: String,
    options: ConsumerOptions,
    config: NsqConfig,
    discovery: DiscoveryClient,
    handlers: Vec<(Arc<dyn MessageHandler>, usize)>,
    tasks: Vec<JoinHandle<()>>,
    session: Option<Arc<Session>>,
}

#[async_trait]
impl Consumer for NsqConsumer {
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
        if self.session.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let queue: DeliveryQueue = Arc::new(tokio::sync::Mutex::new(rx));
        let mut workers = 0usize;
        for (handler, concurrency) in &self.handlers {
            for _ in 0..*concurrency {
                self.tasks.push(tokio::spawn(run_worker(
                    queue.clone(),
                    handler.clone(),
                    self.options.max_attempts,
                    self.config.clone(),
                )));
                workers += 1;
            }
        }

        let session = Arc::new(Session {
            topic: self.topic.clone(),
            channel: self.channel.clone(),
            config: self.config.clone(),
            discovery: self.discovery.clone(),
            ready: u32::try_from(workers).unwrap_or(u32::MAX),
            deliveries: tx,
            connected: Mutex::new(HashSet::new()),
            connections: Mutex::new(Vec::new()),
        });

        session.poll(addresses).await;

        let poller = session.clone();
        let lookupds = addresses.to_vec();
        self.tasks.push(tokio::spawn(async move {
            let period = poller.config.lookupd_poll_interval.max(Duration::from_millis(1));
            let mut ticks = tokio::time::interval(period);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                poller.poll(&lookupds).await;
            }
        }));

        debug!(
            topic = %self.topic,
            channel = %self.channel,
            lookupds = addresses.len(),
            workers,
            "consumer connected"
        );
        self.session = Some(session);
        Ok(())
    }
}

impl Drop for NsqConsumer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(session) = &self.session {
            for connection in lock(&session.connections).iter() {
                connection.abort();
            }
        }
    }
}

async fn run_worker(
    queue: DeliveryQueue,
    handler: Arc<dyn MessageHandler>,
    max_attempts: u16,
    config: NsqConfig,
) {
    loop {
        let next = { queue.lock().await.recv().await };
        let Some(Delivery { message, acks }) = next else {
            return;
        };

        let ack = match handler.handle_message(&message).await {
            Ok(()) => Command::Fin(message.id.clone()),
            Err(err) if message.attempts >= max_attempts => {
                warn!(id = %message.id, attempts = message.attempts, %err, "giving up on message");
                Command::Fin(message.id.clone())
            }
            Err(err) => {
                let delay_ms = config.requeue_delay_ms(message.attempts);
                debug!(id = %message.id, attempts = message.attempts, delay_ms, %err, "requeueing message");
                Command::Req {
                    id: message.id.clone(),
                    delay_ms,
                }
            }
        };

        if acks.send(ack).is_err() {
            debug!(id = %message.id, "connection gone before ack; nsqd will redeliver");
        }
    }
}

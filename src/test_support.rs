//! Test doubles shared by the unit tests.
//!
//! `FakeCluster` is an axum server standing in for both the discovery service
//! and a broker node (`/lookup`, `/nodes`, `/topic/create`, `/pub`), recording
//! every request it sees. `FakeNsqd` speaks the nsqd TCP protocol from a
//! script. `RecordingEmitter` and `CountingFactory` replace the emission and
//! transport collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::emitter::Emitter;
use crate::transport::{Consumer, ConsumerFactory, ConsumerOptions, MessageHandler};
use crate::utils::error::{EmitError, TransportError};

#[derive(Debug, Clone)]
pub(crate) struct FakeClusterConfig {
    pub lookup: StatusCode,
    /// `producers` in a 200 `/lookup` answer.
    pub producers: Value,
    pub nodes_status: StatusCode,
    /// `None` answers `/nodes` with this server as the only node.
    pub nodes: Option<Value>,
    pub create: StatusCode,
    pub publish: StatusCode,
}

impl Default for FakeClusterConfig {
    fn default() -> Self {
        Self {
            lookup: StatusCode::NOT_FOUND,
            producers: json!([]),
            nodes_status: StatusCode::OK,
            nodes: None,
            create: StatusCode::OK,
            publish: StatusCode::OK,
        }
    }
}

struct ClusterState {
    config: FakeClusterConfig,
    port: u16,
    calls: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ClusterState {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub(crate) struct FakeCluster {
    pub addr: String,
    state: Arc<ClusterState>,
}

impl FakeCluster {
    pub async fn start(config: FakeClusterConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ClusterState {
            config,
            port: addr.port(),
            calls: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/lookup", get(lookup))
            .route("/nodes", get(nodes))
            .route("/topic/create", post(create_topic))
            .route("/pub", post(publish))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr.to_string(),
            state,
        }
    }

    pub fn port(&self) -> u16 {
        self.state.port
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state.published.lock().unwrap().clone()
    }
}

fn topic_of(query: &HashMap<String, String>) -> String {
    query.get("topic").cloned().unwrap_or_default()
}

async fn lookup(
    State(state): State<Arc<ClusterState>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.record(format!("GET /lookup?topic={}", topic_of(&query)));
    let body = json!({ "channels": [], "producers": state.config.producers.clone() });
    (state.config.lookup, Json(body))
}

async fn nodes(State(state): State<Arc<ClusterState>>) -> (StatusCode, Json<Value>) {
    state.record("GET /nodes".to_string());
    let body = state.config.nodes.clone().unwrap_or_else(
        || json!([{ "broadcast_address": "127.0.0.1", "tcp_port": state.port }]),
    );
    (state.config.nodes_status, Json(body))
}

async fn create_topic(
    State(state): State<Arc<ClusterState>>,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    state.record(format!("POST /topic/create?topic={}", topic_of(&query)));
    state.config.create
}

async fn publish(
    State(state): State<Arc<ClusterState>>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> StatusCode {
    let topic = topic_of(&query);
    state.record(format!("POST /pub?topic={topic}"));
    state.published.lock().unwrap().push((topic, body.to_vec()));
    state.config.publish
}

/// Emitter that records every publish and optionally fails them.
#[derive(Default)]
pub(crate) struct RecordingEmitter {
    pub published: Mutex<Vec<(String, Value)>>,
    pub fail: bool,
}

impl RecordingEmitter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Emitter for RecordingEmitter {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), EmitError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.clone()));
        if self.fail {
            return Err(EmitError::Rejected("503 Service Unavailable".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FactoryLog {
    pub consumers: Vec<(String, String, ConsumerOptions)>,
    pub handlers: Vec<usize>,
    pub connected: Vec<Vec<String>>,
}

/// Transport stand-in that records registrations and connects without
/// delivering anything.
#[derive(Clone, Default)]
pub(crate) struct CountingFactory {
    pub log: Arc<Mutex<FactoryLog>>,
    pub connect_error: Option<TransportError>,
}

impl CountingFactory {
    pub fn failing_connect(err: TransportError) -> Self {
        Self {
            connect_error: Some(err),
            ..Self::default()
        }
    }

    pub fn consumers(&self) -> usize {
        self.log.lock().unwrap().consumers.len()
    }

    pub fn handlers(&self) -> Vec<usize> {
        self.log.lock().unwrap().handlers.clone()
    }

    pub fn connected(&self) -> Vec<Vec<String>> {
        self.log.lock().unwrap().connected.clone()
    }
}

struct CountingConsumer {
    log: Arc<Mutex<FactoryLog>>,
    connect_error: Option<TransportError>,
}

#[async_trait]
impl Consumer for CountingConsumer {
    fn add_concurrent_handlers(&mut self, _handler: Arc<dyn MessageHandler>, concurrency: usize) {
        self.log.lock().unwrap().handlers.push(concurrency);
    }

    async fn connect_to_lookupds(&mut self, addresses: &[String]) -> Result<(), TransportError> {
        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }
        self.log.lock().unwrap().connected.push(addresses.to_vec());
        Ok(())
    }
}

impl ConsumerFactory for CountingFactory {
    fn new_consumer(
        &self,
        topic: &str,
        channel: &str,
        options: &ConsumerOptions,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        self.log.lock().unwrap().consumers.push((
            topic.to_string(),
            channel.to_string(),
            options.clone(),
        ));
        Ok(Box::new(CountingConsumer {
            log: self.log.clone(),
            connect_error: self.connect_error.clone(),
        }))
    }
}

/// Polls `cond` every 10ms for up to two seconds.
pub(crate) async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

/// Script for [`FakeNsqd`].
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeNsqdConfig {
    /// Bodies sent, attempt 1, once the client is ready. Ids are `0000000000000001`, ...
    pub messages: Vec<Vec<u8>>,
    /// Send a heartbeat before the first message.
    pub heartbeat: bool,
    /// Answer `SUB` with an error frame.
    pub reject_sub: bool,
}

struct NsqdState {
    config: FakeNsqdConfig,
    commands: Mutex<Vec<String>>,
}

impl NsqdState {
    fn record(&self, command: impl Into<String>) {
        self.commands.lock().unwrap().push(command.into());
    }
}

/// A single-node nsqd that answers the handshake, delivers its scripted
/// messages, redelivers on `REQ` with the attempt count bumped, and records
/// every command (plus `EOF` when a client hangs up).
pub(crate) struct FakeNsqd {
    pub port: u16,
    state: Arc<NsqdState>,
}

impl FakeNsqd {
    pub async fn start(config: FakeNsqdConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(NsqdState {
            config,
            commands: Mutex::new(Vec::new()),
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve_nsqd(stream, state).await;
                });
            }
        });

        Self { port, state }
    }

    /// This node as a `/lookup` producer entry.
    pub fn producer(&self) -> Value {
        json!([{ "broadcast_address": "127.0.0.1", "tcp_port": self.port }])
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

fn fake_message_id(index: usize) -> String {
    format!("{:016}", index + 1)
}

async fn serve_nsqd(stream: tokio::net::TcpStream, state: Arc<NsqdState>) -> std::io::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

    use crate::message::RawMessage;
    use crate::transport::protocol::{
        FRAME_ERROR, FRAME_MESSAGE, FRAME_RESPONSE, MAGIC_V2, encode_frame, encode_message,
    };

    let (read, mut write) = stream.into_split();
    let mut read = BufReader::new(read);

    let mut magic = [0u8; 4];
    read.read_exact(&mut magic).await?;
    state.record(if &magic == MAGIC_V2 { "MAGIC" } else { "BAD MAGIC" });

    let send = |frame_type: u32, data: &[u8]| {
        let mut buf = bytes::BytesMut::new();
        encode_frame(frame_type, data, &mut buf);
        buf
    };
    let deliver = |index: usize, attempts: u16| {
        let message = RawMessage {
            id: fake_message_id(index),
            timestamp: 1_700_000_000_000_000_000,
            attempts,
            body: state.config.messages[index].clone(),
        };
        send(FRAME_MESSAGE, &encode_message(&message))
    };
    let mut attempts: HashMap<String, u16> = HashMap::new();

    loop {
        let mut line = String::new();
        if read.read_line(&mut line).await? == 0 {
            state.record("EOF");
            return Ok(());
        }
        let line = line.trim_end().to_string();
        let mut parts = line.split(' ');

        match parts.next().unwrap_or_default() {
            "IDENTIFY" => {
                let len = read.read_u32().await?;
                let mut body = vec![0u8; len as usize];
                read.read_exact(&mut body).await?;
                state.record(format!("IDENTIFY {}", String::from_utf8_lossy(&body)));
                write.write_all(&send(FRAME_RESPONSE, b"OK")).await?;
            }
            "SUB" if state.config.reject_sub => {
                state.record(line.clone());
                write
                    .write_all(&send(FRAME_ERROR, b"E_BAD_TOPIC SUB topic name is not valid"))
                    .await?;
                return Ok(());
            }
            "SUB" => {
                state.record(line.clone());
                write.write_all(&send(FRAME_RESPONSE, b"OK")).await?;
            }
            "RDY" => {
                state.record(line.clone());
                if state.config.heartbeat {
                    write.write_all(&send(FRAME_RESPONSE, b"_heartbeat_")).await?;
                }
                for index in 0..state.config.messages.len() {
                    attempts.insert(fake_message_id(index), 1);
                    write.write_all(&deliver(index, 1)).await?;
                }
            }
            "REQ" => {
                state.record(line.clone());
                let id = parts.next().unwrap_or_default().to_string();
                let next = attempts.get(&id).copied().unwrap_or(1) + 1;
                attempts.insert(id.clone(), next);
                let index: usize = id.parse::<usize>().unwrap() - 1;
                write.write_all(&deliver(index, next)).await?;
            }
            _ => state.record(line.clone()),
        }
    }
}

//! HTTP emitter
//!
//! Publishes by `POST http://{address}/pub?topic={topic}` with an
//! [`EnvelopeBody`] as the request body. The HTTP client is built once per
//! emitter and reused for every publish.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::emitter::Emitter;
use crate::message::EnvelopeBody;
use crate::utils::error::EmitError;

pub const DEFAULT_EMITTER_ADDRESS: &str = "localhost:4151";
pub const DEFAULT_EMITTER_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`HttpEmitter`].
///
/// `EmitterConfig::default()` targets a broker on `localhost:4151`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    pub address: String,
    pub request_timeout: Duration,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_EMITTER_ADDRESS.to_string(),
            request_timeout: DEFAULT_EMITTER_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpEmitter {
    http: Client,
    address: String,
}

impl HttpEmitter {
    pub fn new(config: EmitterConfig) -> Result<Self, EmitError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            address: config.address,
        })
    }

    /// Publishes `payload` to `topic`, asking the receiver to publish its
    /// result to `reply_to`.
    pub async fn request(
        &self,
        topic: &str,
        payload: &Value,
        reply_to: &str,
    ) -> Result<(), EmitError> {
        self.send(topic, EnvelopeBody::new(payload.clone()).with_reply_to(reply_to))
            .await
    }

    async fn send(&self, topic: &str, body: EnvelopeBody) -> Result<(), EmitError> {
        if topic.is_empty() {
            return Err(EmitError::TopicRequired);
        }

        let resp = self
            .http
            .post(format!("http://{}/pub", self.address))
            .query(&[("topic", topic)])
            .body(body.to_bytes()?)
            .send()
            .await?;

        debug!(topic, status = %resp.status(), "published");

        match resp.status() {
            StatusCode::OK => Ok(()),
            other => Err(EmitError::Rejected(other.to_string())),
        }
    }
}

#[async_trait]
impl Emitter for HttpEmitter {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), EmitError> {
        self.send(topic, EnvelopeBody::new(payload.clone())).await
    }
}

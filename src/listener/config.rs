use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::Handler;
use crate::transport::{ConsumerOptions, DEFAULT_MAX_ATTEMPTS};
use crate::utils::error::BusError;

/// Discovery address used when none is configured.
pub const DEFAULT_DISCOVERY_ADDRESS: &str = "localhost:4161";

/// Bound on each discovery/broker HTTP request made while provisioning.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one subscription, as supplied by the caller.
///
/// `topic`, `channel` and `handler` are required; everything else has a
/// default filled in by [`ListenerConfig::resolve`]:
///
/// - `discovery_addresses`: `["localhost:4161"]` when empty
/// - `concurrency`: 1 when 0
/// - `max_attempts`: 5 when 0
#[derive(Clone, Default)]
pub struct ListenerConfig {
    pub topic: String,
    /// Consumer group; processes sharing a channel split its messages.
    pub channel: String,
    pub handler: Option<Arc<dyn Handler>>,
    pub discovery_addresses: Vec<String>,
    pub concurrency: usize,
    /// Create the topic on the broker fleet before subscribing if it is unknown.
    pub auto_create_topic: bool,
    /// Delivery attempts the transport makes before giving up on a message.
    pub max_attempts: u16,
    /// `None` means [`DEFAULT_REQUEST_TIMEOUT`].
    pub request_timeout: Option<Duration>,
}

impl ListenerConfig {
    pub fn new(topic: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            channel: channel.into(),
            ..Self::default()
        }
    }

    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn discovery_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discovery_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn auto_create_topic(mut self, enabled: bool) -> Self {
        self.auto_create_topic = enabled;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u16) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Checks required fields; the first violation wins.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.topic.is_empty() {
            return Err(BusError::TopicRequired);
        }
        if self.channel.is_empty() {
            return Err(BusError::ChannelRequired);
        }
        if self.handler.is_none() {
            return Err(BusError::HandlerRequired);
        }
        Ok(())
    }

    /// Validates, then produces a fully populated configuration.
    pub fn resolve(self) -> Result<ResolvedListenerConfig, BusError> {
        self.validate()?;
        let handler = self.handler.ok_or(BusError::HandlerRequired)?;

        let discovery_addresses = if self.discovery_addresses.is_empty() {
            vec![DEFAULT_DISCOVERY_ADDRESS.to_string()]
        } else {
            self.discovery_addresses
        };

        Ok(ResolvedListenerConfig {
            topic: self.topic,
            channel: self.channel,
            handler,
            discovery_addresses,
            concurrency: self.concurrency.max(1),
            auto_create_topic: self.auto_create_topic,
            max_attempts: if self.max_attempts == 0 {
                DEFAULT_MAX_ATTEMPTS
            } else {
                self.max_attempts
            },
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

impl fmt::Debug for ListenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerConfig")
            .field("topic", &self.topic)
            .field("channel", &self.channel)
            .field("handler", &self.handler.as_ref().map(|_| "Handler"))
            .field("discovery_addresses", &self.discovery_addresses)
            .field("concurrency", &self.concurrency)
            .field("auto_create_topic", &self.auto_create_topic)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// A validated [`ListenerConfig`] with every default applied.
///
/// Fields are read-only; build a new `ListenerConfig` to change anything.
#[derive(Clone)]
pub struct ResolvedListenerConfig {
    topic: String,
    channel: String,
    handler: Arc<dyn Handler>,
    discovery_addresses: Vec<String>,
    concurrency: usize,
    auto_create_topic: bool,
    max_attempts: u16,
    request_timeout: Duration,
}

impl ResolvedListenerConfig {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        self.handler.clone()
    }

    /// Never empty.
    pub fn discovery_addresses(&self) -> &[String] {
        &self.discovery_addresses
    }

    pub fn primary_discovery_address(&self) -> &str {
        &self.discovery_addresses[0]
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn auto_create_topic(&self) -> bool {
        self.auto_create_topic
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn consumer_options(&self) -> ConsumerOptions {
        ConsumerOptions {
            max_attempts: self.max_attempts,
        }
    }
}

impl fmt::Debug for ResolvedListenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedListenerConfig")
            .field("topic", &self.topic)
            .field("channel", &self.channel)
            .field("discovery_addresses", &self.discovery_addresses)
            .field("concurrency", &self.concurrency)
            .field("auto_create_topic", &self.auto_create_topic)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

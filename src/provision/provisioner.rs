//! Topic provisioner
//!
//! State machine, every step returning on its first error:
//!
//! 1. lookup: found -> done; not found -> 2; anything else -> error
//! 2. nodes: non-200 or empty list -> error
//! 3. create on the first node: non-200 -> error carrying the status text
//!
//! There is no retry, backoff or load-balancing across nodes. A concurrent
//! creator racing on the same topic is left to the broker; if it rejects the
//! duplicate, that surfaces as an ordinary creation error.

use tracing::{debug, info};

use crate::discovery::{BrokerNode, DiscoveryClient, TopicLookup};
use crate::utils::error::ProvisionError;

/// Which path a successful [`TopicProvisioner::ensure_topic`] took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    AlreadyExists,
    Created { node: BrokerNode },
}

#[derive(Debug, Clone)]
pub struct TopicProvisioner {
    client: DiscoveryClient,
}

impl TopicProvisioner {
    pub fn new(client: DiscoveryClient) -> Self {
        Self { client }
    }

    /// Makes sure `topic` exists, creating it through `discovery_addr` if needed.
    pub async fn ensure_topic(
        &self,
        discovery_addr: &str,
        topic: &str,
    ) -> Result<Provisioned, ProvisionError> {
        if self.client.lookup_topic(discovery_addr, topic).await? == TopicLookup::Found {
            debug!(topic, "topic already exists");
            return Ok(Provisioned::AlreadyExists);
        }

        let node = self
            .client
            .nodes(discovery_addr)
            .await?
            .into_iter()
            .next()
            .ok_or(ProvisionError::NoNodes)?;

        self.client.create_topic(&node, topic).await?;
        info!(topic, %node, "created topic");

        Ok(Provisioned::Created { node })
    }
}

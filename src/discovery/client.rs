//! Discovery service client
//!
//! HTTP surface consumed here:
//! - `GET  http://{discovery}/lookup?topic={topic}`: 200 known (with the
//!   topic's producers), 404 unknown
//! - `GET  http://{discovery}/nodes`: 200 with the live node list
//! - `POST http://{node}/topic/create?topic={topic}`: 200 created
//!
//! Every request is bounded by the timeout the client was built with.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::discovery::node::{BrokerNode, NodeList};
use crate::utils::error::ProvisionError;

/// Outcome of a topic lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicLookup {
    Found,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: Client,
}

impl DiscoveryClient {
    /// Builds a client whose requests (and connects) give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProvisionError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    /// Asks the discovery service at `discovery_addr` whether `topic` exists.
    ///
    /// Any status other than 200 or 404 is returned as
    /// [`ProvisionError::UnexpectedStatus`].
    pub async fn lookup_topic(
        &self,
        discovery_addr: &str,
        topic: &str,
    ) -> Result<TopicLookup, ProvisionError> {
        let resp = self
            .http
            .get(format!("http://{discovery_addr}/lookup"))
            .query(&[("topic", topic)])
            .send()
            .await?;

        debug!(%discovery_addr, topic, status = %resp.status(), "topic lookup");

        match resp.status() {
            StatusCode::OK => Ok(TopicLookup::Found),
            StatusCode::NOT_FOUND => Ok(TopicLookup::NotFound),
            other => Err(ProvisionError::UnexpectedStatus(other.as_u16())),
        }
    }

    /// The broker nodes currently producing `topic`. An unknown topic has none.
    pub async fn producers(
        &self,
        discovery_addr: &str,
        topic: &str,
    ) -> Result<Vec<BrokerNode>, ProvisionError> {
        let resp = self
            .http
            .get(format!("http://{discovery_addr}/lookup"))
            .query(&[("topic", topic)])
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(Vec::new()),
            other => return Err(ProvisionError::UnexpectedStatus(other.as_u16())),
        }

        let producers = resp
            .json::<NodeList>()
            .await
            .map_err(ProvisionError::InvalidNodeList)?
            .into_nodes();

        debug!(%discovery_addr, topic, count = producers.len(), "topic producers");
        Ok(producers)
    }

    /// Lists the broker nodes currently registered with the discovery service.
    pub async fn nodes(&self, discovery_addr: &str) -> Result<Vec<BrokerNode>, ProvisionError> {
        let resp = self
            .http
            .get(format!("http://{discovery_addr}/nodes"))
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(ProvisionError::NodesUnavailable(resp.status().to_string()));
        }

        let nodes = resp
            .json::<NodeList>()
            .await
            .map_err(ProvisionError::InvalidNodeList)?
            .into_nodes();

        debug!(%discovery_addr, count = nodes.len(), "discovered broker nodes");
        Ok(nodes)
    }

    /// Issues the create-topic command directly against `node`.
    pub async fn create_topic(&self, node: &BrokerNode, topic: &str) -> Result<(), ProvisionError> {
        let resp = self
            .http
            .post(format!("http://{node}/topic/create"))
            .query(&[("topic", topic)])
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => Ok(()),
            other => Err(ProvisionError::CreateFailed(other.to_string())),
        }
    }
}

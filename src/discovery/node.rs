use std::fmt;

use serde::{Deserialize, Serialize};

/// A live broker node as reported by the discovery service.
///
/// Fetched fresh for every provisioning attempt and never cached, since fleet
/// membership changes between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerNode {
    #[serde(rename = "broadcast_address")]
    pub address: String,
    #[serde(rename = "tcp_port")]
    pub port: u16,
}

impl BrokerNode {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for BrokerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Node list shapes: a bare array, or the array wrapped under `producers`
/// (`/nodes`, and `/lookup` next to its `channels`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NodeList {
    Bare(Vec<BrokerNode>),
    Wrapped { producers: Vec<BrokerNode> },
}

impl NodeList {
    pub(crate) fn into_nodes(self) -> Vec<BrokerNode> {
        match self {
            NodeList::Bare(nodes) => nodes,
            NodeList::Wrapped { producers } => producers,
        }
    }
}

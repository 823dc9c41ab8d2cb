//! The `discovery` module talks HTTP to the discovery service and to broker
//! nodes.
//!
//! It answers two read queries against the discovery service (is a topic known,
//! which broker nodes are live) and issues the create-topic command against a
//! single broker. It holds no state beyond the pooled HTTP client.

pub mod client;
pub mod node;

pub use client::{DiscoveryClient, TopicLookup};
pub use node::BrokerNode;

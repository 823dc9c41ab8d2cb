//! The `error` module defines the error types used within `nsq_bus`.
//!
//! Every failure path returns one of these values up to its immediate caller;
//! nothing here is swallowed or turned into a panic.
//!
//! - `BusError` is what `Listener::on` hands back.
//! - `ProvisionError` covers the discovery/broker HTTP conversation.
//! - `DispatchError` is returned per message to the transport.
//! - `EmitError` comes from publishing a reply.
//! - `TransportError` is raised by a transport while registering or connecting.
//! - `ProtocolError` ends a single nsqd TCP connection; it is logged, never
//!   returned to callers, and the node is retried on the next lookup poll.

use thiserror::Error;

/// Error type produced by user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("topic is mandatory")]
    TopicRequired,

    #[error("channel is mandatory")]
    ChannelRequired,

    #[error("handler is mandatory")]
    HandlerRequired,

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("failed to get broker nodes from discovery: {0}")]
    NodesUnavailable(String),

    #[error("invalid node list from discovery: {0}")]
    InvalidNodeList(reqwest::Error),

    #[error("no nodes found")]
    NoNodes,

    #[error("failed to create topic: {0}")]
    CreateFailed(String),
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("topic is mandatory")]
    TopicRequired,

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("publish request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("publish rejected: {0}")]
    Rejected(String),

    #[error("transport closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("handler failed: {0}")]
    Handler(BoxError),

    #[error("failed to publish reply: {0}")]
    Reply(#[from] EmitError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid topic name: {0:?}")]
    InvalidTopicName(String),

    #[error("invalid channel name: {0:?}")]
    InvalidChannelName(String),

    #[error("no handlers added before connecting")]
    NoHandlers,

    #[error("at least one lookup address is required")]
    NoLookupAddresses,

    #[error("consumer already connected")]
    AlreadyConnected,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("nsqd connection i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for nsqd")]
    Timeout,

    #[error("nsqd closed the connection")]
    Closed,

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    #[error("unknown frame type {0}")]
    UnknownFrameType(u32),

    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    #[error("nsqd error: {0}")]
    Rejected(String),

    #[error("unexpected nsqd response: {0}")]
    UnexpectedResponse(String),

    #[error("failed to encode identify body: {0}")]
    Identify(#[from] serde_json::Error),
}

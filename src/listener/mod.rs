//! The `listener` module is the entry point for starting a subscription.
//!
//! `Listener::on` runs three separable stages: validate the configuration,
//! fill in defaults, then orchestrate provisioning, handler registration and
//! connection, in that order.

pub mod config;
pub mod listener;

pub use self::config::{
    DEFAULT_DISCOVERY_ADDRESS, DEFAULT_REQUEST_TIMEOUT, ListenerConfig, ResolvedListenerConfig,
};
pub use listener::Listener;

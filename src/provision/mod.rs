//! The `provision` module lazily creates a topic on the broker fleet.
//!
//! A consumer started before any producer has published to its topic would
//! otherwise subscribe to nothing; the provisioner checks the discovery service
//! and, when the topic is unknown, creates it on the first live broker node.

pub mod provisioner;

pub use provisioner::{Provisioned, TopicProvisioner};

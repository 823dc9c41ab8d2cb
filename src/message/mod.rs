//! The `message` module defines the units that move through a subscription.
//!
//! A transport delivers a [`RawMessage`]; the dispatcher decodes its body into
//! an [`Envelope`] before handing it to user code. [`EnvelopeBody`] is the JSON
//! wire format shared by both directions, so a published reply is itself a
//! valid message for a listener on the reply topic.

pub mod envelope;
pub mod raw;

pub use envelope::{Envelope, EnvelopeBody};
pub use raw::RawMessage;

#[cfg(test)]
mod tests;

//! Dispatcher
//!
//! Per delivered message:
//! 1. decode the body into an [`Envelope`]; failure goes back to the transport
//! 2. run the handler; its error goes back to the transport unchanged
//! 3. no `replyTo`: done
//! 4. otherwise publish the handler's result to `replyTo`
//!
//! A failed reply publish is returned as the failure of the inbound message,
//! so the transport redelivers and the whole cycle runs again. The handler's
//! side effects may therefore happen more than once.
//!
//! Nothing here retries; redelivery is entirely the transport's call.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dispatch::Handler;
use crate::emitter::Emitter;
use crate::message::{Envelope, RawMessage};
use crate::transport::MessageHandler;
use crate::utils::error::DispatchError;

#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn Handler>,
    emitter: Arc<dyn Emitter>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn Handler>, emitter: Arc<dyn Emitter>) -> Self {
        Self { handler, emitter }
    }

    pub async fn dispatch(&self, message: &RawMessage) -> Result<(), DispatchError> {
        let envelope = Envelope::decode(message)?;
        let reply_to = envelope.reply_to.clone();

        let result = self
            .handler
            .handle(envelope)
            .await
            .map_err(DispatchError::Handler)?;

        if reply_to.is_empty() {
            return Ok(());
        }

        self.emitter.publish(&reply_to, &result).await?;
        debug!(id = %message.id, %reply_to, "reply published");
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle_message(&self, message: &RawMessage) -> Result<(), DispatchError> {
        let outcome = self.dispatch(message).await;
        if let Err(err) = &outcome {
            warn!(id = %message.id, attempts = message.attempts, %err, "message failed");
        }
        outcome
    }
}

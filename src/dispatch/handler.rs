use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::message::Envelope;
use crate::utils::error::BoxError;

/// What the dispatcher gets back from a handler: the serialized reply, or the
/// reason it failed.
pub type HandlerResult = Result<Value, BoxError>;

/// User code run once per delivered message.
///
/// The returned value is published to `envelope.reply_to` when the sender
/// asked for a reply, and ignored otherwise. Handlers run concurrently with
/// themselves when the subscription's concurrency is above one.
///
/// Any `Fn(Envelope) -> impl Future<Output = Result<R, E>>` closure is a
/// handler, where `R: Serialize` is the reply and `E` converts into
/// [`BoxError`]. A reply that fails to serialize counts as a handler error.
///
/// ```ignore
/// let handler = |envelope: Envelope| async move {
///     let order: Order = envelope.decode_payload()?;
///     Ok::<_, BoxError>(Receipt { order_id: order.id, accepted: true })
/// };
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, envelope: Envelope) -> HandlerResult;
}

#[async_trait]
impl<F, Fut, R, E> Handler for F
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    async fn handle(&self, envelope: Envelope) -> HandlerResult {
        let reply = (self)(envelope).await.map_err(Into::into)?;
        Ok(serde_json::to_value(reply)?)
    }
}

//! The `dispatch` module binds a user [`Handler`] to the transport callback
//! shape and closes the request/reply loop.

pub mod dispatcher;
pub mod handler;

pub use dispatcher::Dispatcher;
pub use handler::{Handler, HandlerResult};

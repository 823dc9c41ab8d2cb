//! The `utils` module provides the pieces shared by every other module of
//! `nsq_bus`: the error taxonomy and tracing initialisation.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests;

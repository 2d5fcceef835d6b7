//! Relay logic
//!
//! Decides which sessions receive what for each inbound message.

pub mod dispatcher;

pub use dispatcher::Dispatcher;

//! Server core functionality
//!
//! Binds the listener and hands every accepted connection to its own task.

pub mod core;

pub use self::core::Server;

//! N3FJP relay server
//!
//! Relays station state, chat, roster queries and log-entry transactions
//! between clients speaking the N3FJP network protocol over TCP.

pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod utils;

pub use self::config::ServerConfig;
pub use error::{RelayError, Result};
pub use server::Server;

//! Relay wire protocol
//!
//! Handles UTF-16LE framing, tag parsing, and the typed message views the
//! dispatcher acts on.

pub mod codec;
pub mod framer;
pub mod messages;
pub mod tags;

pub use codec::encode_message;
pub use framer::Framer;
pub use tags::{TagValue, Tags, parse_tags};

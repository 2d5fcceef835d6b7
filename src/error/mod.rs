//! Error handling
//!
//! Defines the relay error type and how session failures are reported.

pub mod handlers;
pub mod types;

pub use types::*;

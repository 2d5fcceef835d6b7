//! Error types
//!
//! Malformed byte sequences and unknown tags never surface here: decoding is
//! lossy and the tag parser is total.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection reset, broken pipe, or any other socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("No data received within {0} seconds")]
    ReadTimeout(u64),

    #[error("Connection closed after {0} empty reads")]
    ConnectionClosed(usize),

    #[error("Outbound writer stopped")]
    WriterStopped,

    #[error("Server full ({max} clients)")]
    ServerFull { max: usize },

    #[error("Capture log error: {0}")]
    Capture(io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

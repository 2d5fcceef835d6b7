//! Configuration management for the relay
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `N3FJP_RELAY_*` environment variables, then command-line overrides.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::error::Result;

/// Default file looked up in the working directory (`config.toml`).
const DEFAULT_CONFIG_FILE: &str = "config";

/// Smallest accumulator that can still hold one encoded `<BOR>`.
const MIN_BUFFER_BYTES: usize = 10;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind the listener on
    pub bind_address: String,

    /// TCP port for client connections
    pub port: u16,

    /// Append-only capture log; capture is off when unset
    pub capture_path: Option<String>,

    /// Connections beyond this are refused
    pub max_clients: usize,

    /// A read that stalls this long ends the session
    pub read_timeout_secs: u64,

    /// Bound on each write to a client socket
    pub write_timeout_secs: u64,

    /// Consecutive empty reads tolerated before the peer counts as gone
    pub max_idle_reads: usize,

    /// Largest partial message kept between reads
    pub max_buffer_bytes: usize,

    /// Capacity of each session's outbound queue
    pub outbound_queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 10000,
            capture_path: None,
            max_clients: 64,
            read_timeout_secs: 300,
            write_timeout_secs: 5,
            max_idle_reads: 3,
            max_buffer_bytes: 1024 * 1024,
            outbound_queue_depth: 256,
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub capture_path: Option<String>,
}

impl ServerConfig {
    /// Load configuration from the given file (or `config.toml` if present),
    /// the environment and command-line overrides.
    pub fn load(config_file: Option<&str>, overrides: Overrides) -> Result<Self> {
        let file = match config_file {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("N3FJP_RELAY")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .set_override_option("bind_address", overrides.bind_address)?
            .set_override_option("port", overrides.port.map(i64::from))?
            .set_override_option("capture_path", overrides.capture_path)?
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> std::result::Result<(), config::ConfigError> {
        if self.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }

        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.read_timeout_secs == 0 || self.write_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "timeouts must be greater than 0".into(),
            ));
        }

        if self.max_idle_reads == 0 {
            return Err(config::ConfigError::Message(
                "max_idle_reads must be greater than 0".into(),
            ));
        }

        if self.max_buffer_bytes < MIN_BUFFER_BYTES {
            return Err(config::ConfigError::Message(format!(
                "max_buffer_bytes must be at least {MIN_BUFFER_BYTES}"
            )));
        }

        if self.outbound_queue_depth == 0 {
            return Err(config::ConfigError::Message(
                "outbound_queue_depth must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and port as `host:port`
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

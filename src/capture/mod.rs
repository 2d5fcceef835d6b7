//! Capture log
//!
//! Optional append-only record of traffic for offline analysis:
//!
//! ```text
//! RAW <address>: <hex bytes as received>
//! MSG <address>: <message body>
//! ```
//!
//! When no path is configured every call is a no-op.

use log::{info, warn};
use std::net::SocketAddr;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{RelayError, Result};
use crate::protocol::codec::to_hex;

pub struct CaptureLog {
    file: Option<Mutex<File>>,
}

impl CaptureLog {
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Opens (or creates) the capture file for appending.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(RelayError::Capture)?;
        info!("Capturing traffic to {}", path.display());
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// Opens the configured path, or returns a disabled log when there is none.
    pub async fn from_path(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::open(path).await,
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Records bytes exactly as read from a client.
    pub async fn raw(&self, addr: SocketAddr, bytes: &[u8]) {
        if self.is_enabled() {
            self.write_line(format!("RAW {}: {}\n", addr, to_hex(bytes))).await;
        }
    }

    /// Records a message body, or a derived event line, for a client.
    pub async fn message(&self, addr: SocketAddr, body: &str) {
        if self.is_enabled() {
            self.write_line(format!("MSG {}: {}\n", addr, body)).await;
        }
    }

    async fn write_line(&self, line: String) {
        let Some(file) = &self.file else {
            return;
        };
        let mut file = file.lock().await;
        // Capture is best effort; traffic handling does not depend on it.
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!("{}", RelayError::Capture(e));
            return;
        }
        if let Err(e) = file.flush().await {
            warn!("{}", RelayError::Capture(e));
        }
    }
}

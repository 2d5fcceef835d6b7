//! Error handlers
//!
//! Reports how a session ended. Nothing here propagates further: a failed
//! session never affects the listener or other sessions.

use log::{error, info, warn};
use std::io::ErrorKind;
use std::net::SocketAddr;

use crate::error::types::RelayError;

/// Logs the reason a session ended at a level matching its severity.
pub fn report_session_end(addr: SocketAddr, err: &RelayError) {
    match err {
        RelayError::ConnectionClosed(_) => info!("Client {} closed connection: {}", addr, err),
        RelayError::Io(e) if is_disconnect(e.kind()) => {
            info!("Client {} disconnected: {}", addr, e)
        }
        RelayError::ReadTimeout(_) | RelayError::WriterStopped | RelayError::ServerFull { .. } => {
            warn!("Client {} dropped: {}", addr, err)
        }
        _ => error!("Client {} session error: {}", addr, err),
    }
}

/// Whether an I/O error kind just means the peer went away.
pub fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

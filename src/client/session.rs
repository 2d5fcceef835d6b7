//! Client session
//!
//! Inbound state of one connection: its address, the framer holding any
//! partial message, and the empty-read count that decides when the peer is
//! gone. Some peers deliver empty reads without closing, so a few in a row
//! are tolerated.

use std::net::SocketAddr;

use crate::error::{RelayError, Result};
use crate::protocol::framer::Framer;

pub struct Session {
    addr: SocketAddr,
    framer: Framer,
    empty_reads: usize,
    max_empty_reads: usize,
    open: bool,
}

impl Session {
    pub fn new(addr: SocketAddr, max_buffer_bytes: usize, max_empty_reads: usize) -> Self {
        Self {
            addr,
            framer: Framer::new(max_buffer_bytes),
            empty_reads: 0,
            max_empty_reads,
            open: true,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Bytes held back waiting for the rest of a message.
    pub fn pending_bytes(&self) -> usize {
        self.framer.buffered_len()
    }

    /// Feeds the result of one read and returns the bodies it completed.
    ///
    /// An empty read counts towards the closure threshold; any data resets it.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        if !self.open {
            return Err(RelayError::ConnectionClosed(self.empty_reads));
        }

        if bytes.is_empty() {
            self.empty_reads += 1;
            if self.empty_reads >= self.max_empty_reads {
                self.open = false;
                return Err(RelayError::ConnectionClosed(self.empty_reads));
            }
            return Ok(Vec::new());
        }

        self.empty_reads = 0;
        Ok(self.framer.push(bytes))
    }

    pub fn close(&mut self) {
        self.open = false;
    }
}

//! Session framer
//!
//! Reassembles message bodies from the raw byte stream of one connection.
//! The markers live inside the UTF-16LE text while the trailer is three raw
//! bytes, so every message after the first trailer starts at an odd offset.
//!
//! Between messages a `<BOR>` is searched at any byte offset. Inside a
//! message the scan stays on the code-unit grid of its own `<BOR>`, so text
//! whose bytes read as a marker one byte off cannot split it. The one
//! off-grid marker accepted inside a message is a `<BOR>` directly after the
//! raw trailer bytes.
//!
//! A segment that lacks `<EOR>` but is followed by another `<BOR>` is taken
//! as complete: the next begin-marker acts as an implicit terminator.

use log::warn;

use crate::protocol::codec::{
    BOR, EOR, TRAILER, decode_utf16le_lossy, encode_utf16le, strip_trailer_chars,
};

/// Per-connection accumulator.
pub struct Framer {
    buffer: Vec<u8>,
    max_buffer: usize,
    bor: Vec<u8>,
    eor: Vec<u8>,
}

/// Where scanning one message stopped.
enum Scan {
    /// Ended by `<EOR>`; holds the offset just past it.
    Complete(usize),
    /// Ran out of bytes; holds the `<BOR>` offset of the open segment.
    Partial(usize),
}

impl Framer {
    pub fn new(max_buffer: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer,
            bor: encode_utf16le(BOR),
            eor: encode_utf16le(EOR),
        }
    }

    /// Number of bytes carried over to the next read.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Appends a chunk and returns every body completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        // A marker split across reads can only begin in the last len-1 bytes.
        let tail_start = self.buffer.len().saturating_sub(self.bor.len() - 1);
        let mut messages = Vec::new();
        let mut pos = 0;

        let keep_from = loop {
            let Some(start) = find_from(&self.buffer, &self.bor, pos) else {
                break pos.max(tail_start);
            };
            match self.scan(start, &mut messages) {
                Scan::Complete(end) => pos = end,
                Scan::Partial(open) => break open,
            }
        };

        self.buffer.drain(..keep_from);

        if self.buffer.len() > self.max_buffer {
            warn!(
                "Discarding {} byte partial message (limit {} bytes)",
                self.buffer.len(),
                self.max_buffer
            );
            self.buffer.clear();
        }

        messages
    }

    /// Walks one message from the `<BOR>` at `start`, following implicit
    /// terminators, and pushes every body it closes.
    fn scan(&self, mut start: usize, messages: &mut Vec<String>) -> Scan {
        let mut seg_start = start + self.bor.len();
        let mut pos = seg_start;

        while pos < self.buffer.len() {
            let rest = &self.buffer[pos..];
            let on_grid = (pos - seg_start) % 2 == 0;

            if on_grid && rest.starts_with(&self.eor) {
                push_body(messages, &self.buffer[seg_start..pos]);
                return Scan::Complete(pos + self.eor.len());
            }

            if rest.starts_with(&self.bor) {
                let segment = &self.buffer[seg_start..pos];
                let body = if on_grid {
                    Some(segment)
                } else {
                    segment.strip_suffix(&TRAILER[..])
                };
                if let Some(body) = body {
                    push_body(messages, body);
                    start = pos;
                    seg_start = pos + self.bor.len();
                    pos = seg_start;
                    continue;
                }
            }

            pos += 1;
        }

        Scan::Partial(start)
    }
}

fn push_body(messages: &mut Vec<String>, segment: &[u8]) {
    let body = strip_trailer_chars(&decode_utf16le_lossy(segment));
    if !body.is_empty() {
        messages.push(body);
    }
}

/// First occurrence of `needle` at or after `from`, at any byte offset.
fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

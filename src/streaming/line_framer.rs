//! Incremental line framing.
//!
//! The upstream provider emits newline-delimited JSON, but the transport may
//! split or coalesce records arbitrarily across fragment boundaries. The
//! framer is an explicit state object (a growing byte buffer) so it can be
//! unit-tested against arbitrary fragmentations.

use bytes::{Bytes, BytesMut};

/// Reassembles complete `\n`-terminated lines from a fragmented byte stream.
///
/// Bytes after the last delimiter stay buffered until the next fragment.
/// Lines are returned without their delimiter; a trailing `\r` is stripped.
///
/// `scanned` marks how far the buffer has already been searched for a
/// delimiter, so each byte is scanned once regardless of fragmentation.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: BytesMut,
    scanned: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every complete line found so far.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(fragment);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == b'\n')
        {
            let pos = self.scanned + pos;
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            lines.push(line.freeze());
            self.scanned = 0;
        }
        self.scanned = self.buffer.len();
        lines
    }

    /// Consume the framer at end-of-stream.
    ///
    /// Returns the unterminated trailing bytes, if any. A non-empty
    /// remainder means the stream was truncated mid-record.
    pub fn finish(self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.freeze())
        }
    }
}

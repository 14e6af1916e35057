//! Incremental line splitter for the codec byte stream.
//!
//! Transports hand over whatever the socket or UART produced: half a line, three
//! lines, or a line split in the middle of a multi-byte UTF-8 sequence. Bytes are
//! buffered until a delimiter arrives so nothing is decoded or dropped early.
use bytes::{Buf, BytesMut};

use super::DELIMITER;

/// Cap on buffered bytes without a delimiter. A codec never sends a line this
/// long; hitting it means we are reading garbage (wrong baud rate, binary noise).
const MAX_PENDING: usize = 256 * 1024;

pub struct LineReassembler {
    buf: BytesMut,
    delimiter: Vec<u8>,
    keep_delimiter: bool,
}

impl LineReassembler {
    pub fn new(delimiter: &str, keep_delimiter: bool) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            delimiter: delimiter.as_bytes().to_vec(),
            keep_delimiter,
        }
    }

    /// CRLF splitter that keeps the delimiter on every emitted line.
    pub fn crlf() -> Self {
        Self::new(DELIMITER, true)
    }

    /// Feed a chunk; returns every line completed by it, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(pos) = find(&self.buf, &self.delimiter) {
            let end = pos + self.delimiter.len();
            let raw = self.buf.split_to(end);
            let body = if self.keep_delimiter {
                &raw[..]
            } else {
                &raw[..pos]
            };
            lines.push(String::from_utf8_lossy(body).into_owned());
        }
        if self.buf.len() > MAX_PENDING {
            log::warn!(
                "line buffer exceeded {} bytes without a delimiter; discarding",
                MAX_PENDING
            );
            self.buf.advance(self.buf.len());
        }
        lines
    }

    /// Text received after the last delimiter. Prompts such as `login:` are never
    /// terminated, so the login negotiator has to look here.
    pub fn partial(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }

    pub fn discard_partial(&mut self) {
        self.buf.clear();
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for LineReassembler {
    fn default() -> Self {
        Self::crlf()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

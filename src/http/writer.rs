use std::io::{self, Write};

use bytes::Bytes;

use crate::http::request::Request;

const HTTP_VERSION: &str = "HTTP/1.0";

/// Serializes the request line, one line per header value and the blank
/// line that ends the preamble.
///
/// Names and values are written as-is; they must already be safe to put on
/// the wire.
pub fn build_preamble(request: &Request) -> Vec<u8> {
    let mut buf = Vec::new();

    // Request line
    let request_line = format!(
        "{} {} {}\r\n",
        request.method().as_str(),
        request.target(),
        HTTP_VERSION
    );
    buf.extend_from_slice(request_line.as_bytes());

    // Headers
    for (k, v) in request.headers().iter() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Whether an [`OutgoingBuffer`] has been fully flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    Done,
    /// The socket would block; wait for the next writable event.
    Pending,
}

/// A byte sequence written to a non-blocking socket across as many writable
/// events as it takes.
///
/// `written` only grows, and each write starts exactly where the previous one
/// stopped, so bytes are neither repeated nor skipped.
#[derive(Debug)]
pub struct OutgoingBuffer {
    buffer: Bytes,
    written: usize,
}

impl OutgoingBuffer {
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
            written: 0,
        }
    }

    /// Writes until everything is flushed or the stream would block.
    pub fn write_to<W: Write>(&mut self, stream: &mut W) -> io::Result<WriteProgress> {
        while self.written < self.buffer.len() {
            match stream.write(&self.buffer[self.written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    ));
                }
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(WriteProgress::Pending);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(WriteProgress::Done)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn total(&self) -> usize {
        self.buffer.len()
    }
}

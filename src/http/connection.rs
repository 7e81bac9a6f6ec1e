use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};

use crate::config::ClientSettings;
use crate::http::error::{ClientError, ProtocolError};
use crate::http::parser::{ParseOutcome, parse_response};
use crate::http::request::Request;
use crate::http::response::{Event, ResponseHandler};
use crate::http::writer::{OutgoingBuffer, WriteProgress, build_preamble};

/// Progress of a single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NotConnected,
    Connected,
    HeaderSent,
    EntitySent,
    HeaderReceived,
    Closed,
}

/// What the connection needs from the socket next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Writable,
    Readable,
    /// Exchange is over; the socket can be dropped.
    Finished,
}

/// Per-socket state machine.
///
/// The connection never owns its socket. The reactor passes the stream in on
/// each readiness event, which keeps the transitions testable against any
/// `Read + Write` value.
pub struct Connection {
    request: Request,
    handler: Box<dyn ResponseHandler>,
    state: ConnectionState,
    preamble: OutgoingBuffer,
    body: OutgoingBuffer,
    recv: BytesMut,
    bytes_read: usize,
    max_header_bytes: usize,
    read_chunk_size: usize,
}

impl Connection {
    pub fn new(
        request: Request,
        handler: Box<dyn ResponseHandler>,
        settings: &ClientSettings,
    ) -> Self {
        let preamble = OutgoingBuffer::new(build_preamble(&request));
        let body = OutgoingBuffer::new(request.body().to_bytes());
        Self {
            request,
            handler,
            state: ConnectionState::NotConnected,
            preamble,
            body,
            recv: BytesMut::with_capacity(settings.read_chunk_size),
            bytes_read: 0,
            max_header_bytes: settings.max_header_bytes,
            read_chunk_size: settings.read_chunk_size.max(1),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Preamble and body bytes accepted by the socket so far.
    pub fn bytes_written(&self) -> usize {
        self.preamble.written() + self.body.written()
    }

    /// Bytes received so far, header block included.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// The non-blocking connect completed.
    pub fn on_connected(&mut self) {
        if self.state == ConnectionState::NotConnected {
            self.state = ConnectionState::Connected;
            tracing::debug!(uri = %self.request.uri(), "Connected");
        }
    }

    /// Flushes as much of the preamble and body as the socket accepts.
    pub fn on_writable<W: Write>(&mut self, stream: &mut W) -> Readiness {
        match self.state {
            ConnectionState::Connected | ConnectionState::HeaderSent
                if !self.is_write_complete() =>
            {
                match self.write_pending(stream) {
                    Ok(WriteProgress::Pending) => Readiness::Writable,
                    Ok(WriteProgress::Done) => Readiness::Readable,
                    Err(e) => self.fail(e.into()),
                }
            }
            ConnectionState::NotConnected => Readiness::Writable,
            ConnectionState::Closed => Readiness::Finished,
            _ => Readiness::Readable,
        }
    }

    /// Drains the socket, feeding the parser until the header block is
    /// complete and streaming body chunks after that.
    pub fn on_readable<R: Read>(&mut self, stream: &mut R) -> Readiness {
        match self.state {
            ConnectionState::HeaderSent
            | ConnectionState::EntitySent
            | ConnectionState::HeaderReceived => {}
            ConnectionState::Closed => return Readiness::Finished,
            _ => return Readiness::Writable,
        }
        if !self.is_write_complete() {
            return Readiness::Writable;
        }

        let mut chunk = vec![0u8; self.read_chunk_size];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return self.finish(),
                Ok(n) => {
                    self.bytes_read += n;
                    if let Err(e) = self.on_bytes(&chunk[..n]) {
                        return self.fail(e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Readiness::Readable,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(e.into()),
            }
        }
    }

    /// Ends the exchange with `error`, reporting it to the handler once.
    pub fn fail(&mut self, error: ClientError) -> Readiness {
        if self.state != ConnectionState::Closed {
            tracing::debug!(
                uri = %self.request.uri(),
                state = ?self.state,
                error = %error,
                "Exchange failed"
            );
            self.state = ConnectionState::Closed;
            self.handler.on_event(Event::Failed(error));
        }
        Readiness::Finished
    }

    fn is_write_complete(&self) -> bool {
        match self.state {
            ConnectionState::NotConnected | ConnectionState::Connected => false,
            ConnectionState::HeaderSent => !self.request.body().is_present(),
            _ => true,
        }
    }

    fn write_pending<W: Write>(&mut self, stream: &mut W) -> io::Result<WriteProgress> {
        if self.state == ConnectionState::Connected {
            if self.preamble.write_to(stream)? == WriteProgress::Pending {
                return Ok(WriteProgress::Pending);
            }
            self.state = ConnectionState::HeaderSent;
            tracing::debug!(
                uri = %self.request.uri(),
                bytes = self.preamble.total(),
                "Header sent"
            );
        }

        if self.state == ConnectionState::HeaderSent && self.request.body().is_present() {
            if self.body.write_to(stream)? == WriteProgress::Pending {
                return Ok(WriteProgress::Pending);
            }
            self.state = ConnectionState::EntitySent;
            tracing::debug!(uri = %self.request.uri(), bytes = self.body.total(), "Entity sent");
        }

        Ok(WriteProgress::Done)
    }

    fn on_bytes(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        if self.state == ConnectionState::HeaderReceived {
            self.handler.on_event(Event::BodyChunk(Bytes::copy_from_slice(bytes)));
            return Ok(());
        }

        self.recv.extend_from_slice(bytes);
        let parsed = match parse_response(&self.recv) {
            ParseOutcome::Incomplete => None,
            ParseOutcome::Parsed { head, leftover } => Some((head, leftover.len())),
            ParseOutcome::Malformed(e) => return Err(e.into()),
        };

        let Some((head, leftover_len)) = parsed else {
            if self.recv.len() > self.max_header_bytes {
                return Err(ProtocolError::HeaderTooLarge(self.max_header_bytes).into());
            }
            return Ok(());
        };

        let body_start = self.recv.len() - leftover_len;
        let leftover = self.recv.split_off(body_start).freeze();
        self.recv.clear();

        self.state = ConnectionState::HeaderReceived;
        tracing::debug!(uri = %self.request.uri(), status = head.status, "Header received");
        self.handler.on_event(Event::HeaderReceived(head));
        if !leftover.is_empty() {
            self.handler.on_event(Event::BodyChunk(leftover));
        }
        Ok(())
    }

    /// Peer closed its side.
    fn finish(&mut self) -> Readiness {
        if self.state != ConnectionState::HeaderReceived {
            return self.fail(ProtocolError::ClosedBeforeHeader.into());
        }
        self.state = ConnectionState::Closed;
        tracing::debug!(
            uri = %self.request.uri(),
            bytes_read = self.bytes_read,
            "Exchange completed"
        );
        self.handler.on_event(Event::Completed);
        Readiness::Finished
    }
}

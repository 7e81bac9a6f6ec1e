use bytes::Bytes;

use crate::http::error::ClientError;
use crate::http::headers::HttpHeaders;

/// Status line and headers of a response.
///
/// The body is never part of this value; it is streamed to the handler as
/// [`Event::BodyChunk`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Three digit status code
    pub status: u16,
    /// Reason phrase, possibly empty
    pub reason: String,
    /// Protocol version as sent by the peer, e.g. `HTTP/1.1`
    pub version: String,
    pub headers: HttpHeaders,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Progress of one exchange, delivered in order to its handler.
///
/// For a given exchange the sequence is always
/// `HeaderReceived, BodyChunk*, Completed` or ends early with a single
/// `Failed`.
#[derive(Debug)]
pub enum Event {
    HeaderReceived(ResponseHead),
    BodyChunk(Bytes),
    Failed(ClientError),
    Completed,
}

/// Receiver of exchange events.
///
/// Implemented for every `FnMut(Event)`, so a closure is enough in most
/// cases.
pub trait ResponseHandler {
    fn on_event(&mut self, event: Event);
}

impl<F> ResponseHandler for F
where
    F: FnMut(Event),
{
    fn on_event(&mut self, event: Event) {
        self(event)
    }
}

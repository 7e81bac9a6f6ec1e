//! Non-blocking HTTP client facade.
//!
//! `get`/`post` only register an exchange with the [`Reactor`]; nothing
//! happens on the wire until [`HttpClient::wait_all`] drives the loop, which
//! is the only blocking call in the client.
//!
//! # Example
//!
//! ```no_run
//! use lambda_bootstrap::client::HttpClient;
//! use lambda_bootstrap::config::ClientSettings;
//! use lambda_bootstrap::http::Event;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut client = HttpClient::new(ClientSettings::default())?;
//! let uri = url::Url::parse("http://127.0.0.1:9001/2018-06-01/runtime/invocation/next")?;
//! client.get(uri, |event: Event| println!("{event:?}"))?;
//! client.wait_all()?;
//! # Ok(())
//! # }
//! ```

pub mod reactor;

use std::io;
use std::sync::mpsc;

use bytes::{Bytes, BytesMut};
use mio::Token;
use url::Url;

use crate::config::ClientSettings;
use crate::http::error::ClientError;
use crate::http::request::{Body, Request};
use crate::http::response::{Event, ResponseHandler, ResponseHead};

pub use reactor::Reactor;

pub struct HttpClient {
    reactor: Reactor,
}

impl HttpClient {
    pub fn new(settings: ClientSettings) -> io::Result<Self> {
        Ok(Self {
            reactor: Reactor::new(settings)?,
        })
    }

    pub fn get<H>(&mut self, uri: Url, handler: H) -> Result<Token, ClientError>
    where
        H: ResponseHandler + 'static,
    {
        tracing::debug!(uri = %uri, "get");
        self.request(Request::get(uri)?, handler)
    }

    pub fn post<H>(&mut self, uri: Url, body: Body, handler: H) -> Result<Token, ClientError>
    where
        H: ResponseHandler + 'static,
    {
        tracing::debug!(uri = %uri, bytes = body.len(), "post");
        self.request(Request::post(uri, body)?, handler)
    }

    pub fn request<H>(&mut self, request: Request, handler: H) -> Result<Token, ClientError>
    where
        H: ResponseHandler + 'static,
    {
        self.reactor.submit(request, Box::new(handler))
    }

    /// Submits `request` with a handler that queues its events for
    /// [`Exchange::collect`].
    pub fn exchange(&mut self, request: Request) -> Result<Exchange, ClientError> {
        let (tx, rx) = mpsc::channel();
        self.request(request, move |event: Event| {
            // The receiver is only gone if the caller dropped the exchange.
            let _ = tx.send(event);
        })?;
        Ok(Exchange { events: rx })
    }

    /// Blocks until no exchange is left in flight.
    pub fn wait_all(&mut self) -> io::Result<()> {
        self.reactor.wait_all()
    }

    pub fn in_flight(&self) -> usize {
        self.reactor.in_flight()
    }
}

/// Events of one exchange queued for later inspection.
pub struct Exchange {
    events: mpsc::Receiver<Event>,
}

/// Everything an exchange delivered, gathered after the reactor drained it.
#[derive(Debug)]
pub struct Collected {
    /// Present once the header block was parsed, even if the exchange failed
    /// afterwards.
    pub head: Option<ResponseHead>,
    pub body: Bytes,
    /// Set when the exchange ended with `Failed`.
    pub error: Option<ClientError>,
}

impl Exchange {
    /// Folds the queued events. Meant to be called after
    /// [`HttpClient::wait_all`] returned.
    pub fn collect(self) -> Collected {
        let mut head = None;
        let mut body = BytesMut::new();
        let mut error = None;
        let mut finished = false;

        for event in self.events.try_iter() {
            match event {
                Event::HeaderReceived(h) => head = Some(h),
                Event::BodyChunk(chunk) => body.extend_from_slice(&chunk),
                Event::Failed(e) => {
                    error = Some(e);
                    finished = true;
                }
                Event::Completed => finished = true,
            }
        }

        if !finished {
            error = Some(ClientError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "exchange did not finish",
            )));
        }

        Collected {
            head,
            body: body.freeze(),
            error,
        }
    }
}

//! Readiness-driven event loop.
//!
//! One `mio::Poll` multiplexes every in-flight exchange. Each socket is
//! registered under its own [`Token`]; readiness for that token is handed to
//! the matching [`Connection`], whose answer decides the next interest or
//! removes the socket from the live set.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Registry, Token};

use crate::config::ClientSettings;
use crate::http::connection::{Connection, ConnectionState, Readiness};
use crate::http::error::ClientError;
use crate::http::request::Request;
use crate::http::response::ResponseHandler;

struct Live {
    stream: TcpStream,
    connection: Connection,
    interest: Readiness,
}

impl Live {
    fn drive(&mut self) -> Readiness {
        if self.connection.state() == ConnectionState::NotConnected {
            match connect_result(&self.stream) {
                Ok(true) => self.connection.on_connected(),
                Ok(false) => return Readiness::Writable,
                Err(e) => return self.connection.fail(e.into()),
            }
        }

        match self.interest {
            Readiness::Writable => self.connection.on_writable(&mut self.stream),
            Readiness::Readable => self.connection.on_readable(&mut self.stream),
            Readiness::Finished => Readiness::Finished,
        }
    }
}

/// Owns the multiplexer and every live connection.
pub struct Reactor {
    poll: Poll,
    events: Events,
    live: HashMap<Token, Live>,
    next_token: usize,
    settings: ClientSettings,
}

impl Reactor {
    pub fn new(settings: ClientSettings) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(settings.events_capacity.max(1)),
            live: HashMap::new(),
            next_token: 0,
            settings,
        })
    }

    /// Starts a non-blocking exchange and returns without waiting.
    ///
    /// `Connection: close` is added to the request. An error is returned only
    /// when the exchange could not be started at all (address resolution,
    /// socket creation, immediate connect failure, registration); the handler
    /// is not invoked in that case. Every later failure reaches the handler
    /// as [`crate::http::Event::Failed`].
    pub fn submit(
        &mut self,
        mut request: Request,
        handler: Box<dyn ResponseHandler>,
    ) -> Result<Token, ClientError> {
        request.close_connection();
        let addr = resolve(&request)?;

        let mut stream = TcpStream::connect(addr)?;
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        self.poll
            .registry()
            .register(&mut stream, token, Interest::WRITABLE)?;

        tracing::debug!(
            token = ?token,
            method = request.method().as_str(),
            uri = %request.uri(),
            addr = %addr,
            "Exchange submitted"
        );

        let connection = Connection::new(request, handler, &self.settings);
        self.live.insert(
            token,
            Live {
                stream,
                connection,
                interest: Readiness::Writable,
            },
        );
        Ok(token)
    }

    /// Number of exchanges still in flight.
    pub fn in_flight(&self) -> usize {
        self.live.len()
    }

    /// Blocks until every live exchange has completed or failed.
    ///
    /// Errors only when the multiplexer itself fails; connection errors are
    /// delivered to their own handlers and never end the loop.
    pub fn wait_all(&mut self) -> io::Result<()> {
        while !self.live.is_empty() {
            self.turn()?;
        }
        Ok(())
    }

    /// Waits for one batch of readiness events and dispatches it.
    pub fn turn(&mut self) -> io::Result<()> {
        if let Err(e) = self.poll.poll(&mut self.events, None) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            tracing::warn!(error = %e, "Readiness wait failed");
            return Err(e);
        }

        let registry = self.poll.registry();
        for event in self.events.iter() {
            let token = event.token();
            // Sporadic events for already removed sockets are ignored.
            let Some(live) = self.live.get_mut(&token) else {
                continue;
            };

            let next = live.drive();
            if next == Readiness::Finished {
                remove(registry, &mut self.live, token);
                continue;
            }
            if next != live.interest {
                if let Err(e) = registry.reregister(&mut live.stream, token, interest_for(next)) {
                    live.connection.fail(e.into());
                    remove(registry, &mut self.live, token);
                    continue;
                }
                live.interest = next;
            }
        }
        Ok(())
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            tracing::debug!(abandoned = self.live.len(), "Reactor dropped with live exchanges");
        }
    }
}

fn remove(registry: &Registry, live: &mut HashMap<Token, Live>, token: Token) {
    if let Some(mut entry) = live.remove(&token) {
        if let Err(e) = registry.deregister(&mut entry.stream) {
            tracing::debug!(token = ?token, error = %e, "Deregister failed");
        }
        tracing::debug!(
            token = ?token,
            written = entry.connection.bytes_written(),
            read = entry.connection.bytes_read(),
            "Exchange removed"
        );
    }
}

fn interest_for(readiness: Readiness) -> Interest {
    match readiness {
        Readiness::Readable => Interest::READABLE,
        _ => Interest::WRITABLE,
    }
}

/// Whether a non-blocking connect has finished.
///
/// `Ok(false)` means the writable event was spurious and the connect is
/// still in progress.
fn connect_result(stream: &TcpStream) -> io::Result<bool> {
    if let Some(e) = stream.take_error()? {
        return Err(e);
    }
    match stream.peer_addr() {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
        Err(e) => Err(e),
    }
}

fn resolve(request: &Request) -> Result<SocketAddr, ClientError> {
    let mut addrs = (request.host(), request.port()).to_socket_addrs()?;
    addrs.next().ok_or_else(|| {
        ClientError::Transport(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address for {}:{}", request.host(), request.port()),
        ))
    })
}

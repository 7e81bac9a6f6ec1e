//! HTTP/1.0 client protocol implementation.
//!
//! This module implements the wire side of a small, non-persistent HTTP
//! client: request framing, incremental response parsing and the
//! per-connection state machine. It never touches a multiplexer; the
//! [`crate::client`] reactor owns the sockets and feeds readiness into
//! [`connection::Connection`].
//!
//! # Architecture
//!
//! - **`headers`**: Ordered, case-insensitive header multimap
//! - **`request`**: Outgoing request with its `Host`/`Content-Length` invariants
//! - **`response`**: Response head and the events delivered to handlers
//! - **`writer`**: Preamble serialization and partial-write tracking
//! - **`parser`**: Restartable response header parser
//! - **`connection`**: The per-exchange state machine
//! - **`error`**: Transport and protocol errors
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────┐
//!        │ NotConnected │ ← Non-blocking connect in flight
//!        └──────┬───────┘
//!               │ Connect completed
//!               ▼
//!        ┌──────────────┐
//!        │  Connected   │ ← Writing preamble (possibly partially)
//!        └──────┬───────┘
//!               │ Preamble flushed
//!               ▼
//!        ┌──────────────┐
//!        │  HeaderSent  │ ← Writing body, if any
//!        └──────┬───────┘
//!               │ Body flushed (skipped without a body)
//!               ▼
//!        ┌──────────────┐
//!        │  EntitySent  │ ← Reading and parsing the response header
//!        └──────┬───────┘
//!               │ Header parsed
//!               ▼
//!        ┌────────────────┐
//!        │ HeaderReceived │ ← Streaming body chunks
//!        └──────┬─────────┘
//!               │ Peer closed
//!               ▼
//!        ┌──────────────┐
//!        │    Closed    │ ← Also reached from any state on error
//!        └──────────────┘
//! ```
//!
//! The response body has no length-based framing: it ends when the peer
//! closes the connection.

pub mod connection;
pub mod error;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

pub use connection::{Connection, ConnectionState, Readiness};
pub use error::{ClientError, ProtocolError};
pub use headers::HttpHeaders;
pub use parser::{ParseOutcome, parse_response};
pub use request::{Body, Method, Request};
pub use response::{Event, ResponseHandler, ResponseHead};
pub use writer::build_preamble;

use std::io;

/// Why a response header block was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Status line does not look like `HTTP/x.y CODE reason`.
    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),

    /// Status code is not a three digit integer.
    #[error("invalid status code: {0:?}")]
    InvalidStatusCode(String),

    /// A header line has no `:` separator or an empty name.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// Header block is not valid UTF-8.
    #[error("response header is not valid UTF-8")]
    InvalidEncoding,

    /// Header terminator not seen within the configured limit.
    #[error("response header exceeds {0} bytes")]
    HeaderTooLarge(usize),

    /// Peer closed the connection before a full header block arrived.
    #[error("connection closed before response header was received")]
    ClosedBeforeHeader,
}

/// Errors surfaced by the HTTP client for a single exchange.
///
/// None of these ever escape the reactor loop: they are delivered to the
/// handler of the exchange that failed.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connect, write or read failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The peer sent something that is not an HTTP response.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The target URI cannot be reached with this client.
    #[error("invalid uri: {0}")]
    InvalidUri(String),
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, ClientError::Protocol(_))
    }
}

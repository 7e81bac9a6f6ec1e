use bytes::Bytes;
use url::Url;

use crate::http::error::ClientError;
use crate::http::headers::HttpHeaders;

/// HTTP request methods spoken by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Submit an entity
    POST,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Example
    ///
    /// ```
    /// # use lambda_bootstrap::http::request::Method;
    /// assert_eq!(Method::from_str("POST"), Some(Method::POST));
    /// assert_eq!(Method::from_str("post"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
        }
    }
}

/// Entity sent after the request preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// No entity, no `Content-Length`.
    Empty,
    /// UTF-8 text payload.
    Text(String),
    /// Raw binary payload.
    Binary(Bytes),
}

impl Body {
    pub fn is_present(&self) -> bool {
        !matches!(self, Body::Empty)
    }

    /// Exact number of bytes that go on the wire.
    pub fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Text(s) => s.len(),
            Body::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            Body::Binary(b) => b.clone(),
        }
    }
}

/// An outgoing HTTP/1.0 request.
///
/// Construction pins down the wire invariants: `Host` always comes from the
/// URI and `Content-Length` always matches the body, so neither can drift
/// from what is actually sent.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Url,
    headers: HttpHeaders,
    body: Body,
}

impl Request {
    /// Creates a body-less request for `uri`.
    ///
    /// Fails if the URI has no host or a scheme without a known default port.
    pub fn new(method: Method, uri: Url) -> Result<Self, ClientError> {
        let host = uri
            .host_str()
            .ok_or_else(|| ClientError::InvalidUri(format!("{uri}: missing host")))?;
        if uri.port_or_known_default().is_none() {
            return Err(ClientError::InvalidUri(format!(
                "{uri}: unsupported scheme {}",
                uri.scheme()
            )));
        }

        let host_value = match uri.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let mut headers = HttpHeaders::new();
        headers.set("Host", host_value);

        Ok(Self {
            method,
            uri,
            headers,
            body: Body::Empty,
        })
    }

    pub fn get(uri: Url) -> Result<Self, ClientError> {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: Url, body: Body) -> Result<Self, ClientError> {
        Ok(Self::new(Method::POST, uri)?.with_body(body))
    }

    /// Adds a header value. `Host` and `Content-Length` are managed by the
    /// request itself and are ignored here.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        if !is_managed(name) {
            self.headers.add(name, value);
        }
        self
    }

    /// Replaces the body and keeps `Content-Length` in step with it.
    pub fn with_body(mut self, body: Body) -> Self {
        if body.is_present() {
            self.headers.set("Content-Length", body.len().to_string());
        } else {
            self.headers.remove("Content-Length");
        }
        self.body = body;
        self
    }

    /// Marks the request as non-persistent.
    pub fn close_connection(&mut self) {
        self.headers.set("Connection", "close");
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Host to connect to.
    pub fn host(&self) -> &str {
        self.uri.host_str().unwrap_or_default()
    }

    /// Port to connect to: explicit, or 80/443 by scheme.
    pub fn port(&self) -> u16 {
        self.uri.port_or_known_default().unwrap_or(80)
    }

    /// Path plus query, as sent on the request line.
    pub fn target(&self) -> String {
        let path = if self.uri.path().is_empty() {
            "/"
        } else {
            self.uri.path()
        };
        match self.uri.query() {
            Some(q) => format!("{path}?{q}"),
            None => path.to_string(),
        }
    }
}

fn is_managed(name: &str) -> bool {
    name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length")
}

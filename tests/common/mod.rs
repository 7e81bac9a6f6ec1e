//! Scripted runtime API used by the integration tests.
//!
//! A tokio listener on a background thread reads each HTTP request in full,
//! records it, writes the scripted reply and closes the connection.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

/// Bytes written back, with a pause between chunks so the client sees them
/// in separate reads.
#[derive(Debug, Clone)]
pub struct Reply {
    pub chunks: Vec<Vec<u8>>,
    pub pause: Duration,
    /// Abort with a TCP reset after the last chunk instead of a clean close.
    pub reset: bool,
}

impl Reply {
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            chunks: vec![bytes.into()],
            pause: Duration::ZERO,
            reset: false,
        }
    }

    pub fn chunked(chunks: Vec<Vec<u8>>, pause: Duration) -> Self {
        Self {
            chunks,
            pause,
            reset: false,
        }
    }

    /// Sends `bytes`, waits `pause` and resets the connection.
    pub fn reset_after(bytes: impl Into<Vec<u8>>, pause: Duration) -> Self {
        Self {
            chunks: vec![bytes.into()],
            pause,
            reset: true,
        }
    }

    pub fn invocation(request_id: &str, body: &str) -> Self {
        Self::raw(format!(
            "HTTP/1.1 200 OK\r\n\
             Lambda-Runtime-Aws-Request-Id: {request_id}\r\n\
             Lambda-Runtime-Deadline-Ms: 1700000000000\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             \r\n\
             {body}",
            body.len()
        ))
    }

    pub fn accepted() -> Self {
        Self::raw(
            "HTTP/1.1 202 Accepted\r\nContent-Type: application/json\r\n\r\n{\"status\":\"OK\"}",
        )
    }

    pub fn unavailable() -> Self {
        Self::raw("HTTP/1.1 503 Service Unavailable\r\n\r\n")
    }
}

#[derive(Default)]
struct State {
    requests: Mutex<Vec<Recorded>>,
    invocations: Mutex<VecDeque<Reply>>,
    /// When set, every request gets the next reply from here regardless of
    /// its route.
    raw: Mutex<Option<VecDeque<Reply>>>,
}

impl State {
    fn reply_for(&self, request: &Recorded) -> Reply {
        if let Some(raw) = self.raw.lock().unwrap().as_mut() {
            return raw.pop_front().unwrap_or_else(Reply::unavailable);
        }
        if request.method == "GET" && request.path.ends_with("/runtime/invocation/next") {
            return self
                .invocations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(Reply::unavailable);
        }
        if request.method == "POST" {
            return Reply::accepted();
        }
        Reply::raw("HTTP/1.1 404 Not Found\r\n\r\n")
    }
}

pub struct MockControlPlane {
    addr: SocketAddr,
    state: Arc<State>,
}

impl MockControlPlane {
    /// Routes like the runtime API: polls pop scripted invocations, posts are
    /// accepted.
    pub fn start() -> Self {
        Self::spawn(State::default())
    }

    /// Answers the n-th request with the n-th reply.
    pub fn with_replies(replies: Vec<Reply>) -> Self {
        Self::spawn(State {
            raw: Mutex::new(Some(replies.into())),
            ..State::default()
        })
    }

    fn spawn(state: State) -> Self {
        let state = Arc::new(state);
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let server_state = state.clone();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = TcpListener::from_std(listener).unwrap();
                while let Ok((socket, _)) = listener.accept().await {
                    let state = server_state.clone();
                    tokio::spawn(async move {
                        let _ = serve(socket, state).await;
                    });
                }
            });
        });

        Self { addr, state }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `host:port`, as found in `AWS_LAMBDA_RUNTIME_API`.
    pub fn runtime_api(&self) -> String {
        self.addr.to_string()
    }

    pub fn url(&self, path: &str) -> url::Url {
        url::Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    pub fn push_invocation(&self, request_id: &str, body: &str) {
        self.push_reply(Reply::invocation(request_id, body));
    }

    pub fn push_reply(&self, reply: Reply) {
        self.state.invocations.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn serve(mut socket: TcpStream, state: Arc<State>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut tmp).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }

    let recorded = Recorded {
        method,
        path,
        headers,
        body,
    };
    let reply = state.reply_for(&recorded);
    state.requests.lock().unwrap().push(recorded);

    for (i, chunk) in reply.chunks.iter().enumerate() {
        if i > 0 && !reply.pause.is_zero() {
            tokio::time::sleep(reply.pause).await;
        }
        socket.write_all(chunk).await?;
        socket.flush().await?;
    }
    if reply.reset {
        tokio::time::sleep(reply.pause).await;
        // Zero linger turns the close into an RST.
        socket.set_linger(Some(Duration::ZERO))?;
        drop(socket);
        return Ok(());
    }
    socket.shutdown().await
}

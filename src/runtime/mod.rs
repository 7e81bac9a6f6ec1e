//! Invocation control loop.
//!
//! ```text
//!   Init ──(resolution fails)──▶ report InitError, stop
//!    │
//!    ▼
//!   Polling ──▶ Invoking ──▶ Reporting ──┐
//!    ▲                                   │
//!    └───────────────────────────────────┘
//! ```
//!
//! Exactly one invocation is in flight at a time: the next poll is only
//! issued once the previous response or error has been posted.

pub mod endpoints;
pub mod error;
pub mod handler;
pub mod invocation;

use std::io;
use std::panic::{self, AssertUnwindSafe};

use anyhow::Context;
use bytes::Bytes;
use url::Url;

use crate::client::{Collected, HttpClient};
use crate::config::{BackoffSettings, Config};
use crate::http::error::{ClientError, ProtocolError};
use crate::http::request::{Body, Request};

pub use endpoints::Endpoints;
pub use error::ErrorReport;
pub use handler::{Handler, HandlerError, HandlerRegistry, HandlerResolver, ResolveError};
pub use invocation::{Invocation, REQUEST_ID_HEADER};

/// Why a poll did not yield an invocation.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response is missing the {} header", REQUEST_ID_HEADER)]
    MissingRequestId,
}

/// What one pass through the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Handler output was posted.
    Responded { request_id: String },
    /// Handler failed and the failure was posted.
    HandlerFailed { request_id: String },
    /// No invocation was processed. A request id is present when the failure
    /// happened after it was known and was reported against it.
    PollFailed { request_id: Option<String> },
}

struct PollFailure {
    request_id: Option<String>,
    error: InvocationError,
}

pub struct Runtime {
    client: HttpClient,
    endpoints: Endpoints,
    handler: Box<dyn Handler>,
    backoff: BackoffSettings,
    poll_failures: u32,
}

impl Runtime {
    /// Resolves the handler and prepares the loop.
    ///
    /// When resolution fails an `InitError` is posted to the init error
    /// endpoint, once, and the error is returned; no poll is attempted.
    pub fn init<R>(config: &Config, resolver: &mut R) -> anyhow::Result<Self>
    where
        R: HandlerResolver + ?Sized,
    {
        let endpoints = Endpoints::new(&config.runtime_api)
            .with_context(|| format!("Invalid runtime API address {:?}", config.runtime_api))?;
        let mut client =
            HttpClient::new(config.settings.client.clone()).context("Failed to create reactor")?;

        let resolved = match config.handler.as_deref() {
            Some(reference) => resolver.resolve(&config.task_root, reference),
            None => Err(ResolveError::Missing),
        };

        let handler = match resolved {
            Ok(handler) => handler,
            Err(e) => {
                tracing::error!(
                    handler = ?config.handler,
                    task_root = %config.task_root.display(),
                    error = %e,
                    "Handler resolution failed"
                );
                let report = ErrorReport::init(e.to_string());
                post_report(&mut client, endpoints.init_error(), &report)
                    .context("Reactor failed while reporting init error")?;
                return Err(anyhow::Error::new(e).context("Init failed"));
            }
        };

        tracing::info!(
            handler = ?config.handler,
            runtime_api = %config.runtime_api,
            "Runtime initialised"
        );

        Ok(Self {
            client,
            endpoints,
            handler,
            backoff: config.settings.poll_backoff.clone(),
            poll_failures: 0,
        })
    }

    /// Polls, invokes and reports forever.
    ///
    /// Invocation failures never end the loop; only a failure of the
    /// readiness multiplexer does.
    pub fn run(mut self) -> anyhow::Result<()> {
        loop {
            self.step().context("Reactor failed")?;
        }
    }

    /// One Polling → Invoking → Reporting cycle.
    ///
    /// The error case is reserved for multiplexer failures.
    pub fn step(&mut self) -> io::Result<StepOutcome> {
        let invocation = match self.poll()? {
            Ok(invocation) => {
                self.poll_failures = 0;
                invocation
            }
            Err(failure) => return self.on_poll_failure(failure),
        };

        let request_id = invocation.request_id.clone();
        tracing::info!(
            request_id = %request_id,
            bytes = invocation.payload.len(),
            deadline_ms = ?invocation.deadline_ms(),
            function_arn = ?invocation.function_arn(),
            trace_id = ?invocation.trace_id(),
            "Invocation received"
        );

        match self.invoke(&invocation) {
            Ok(output) => {
                tracing::info!(
                    request_id = %request_id,
                    bytes = output.len(),
                    "Invocation succeeded"
                );
                let uri = self.endpoints.response(&request_id);
                post_body(&mut self.client, uri, Body::Binary(Bytes::from(output)))?;
                Ok(StepOutcome::Responded { request_id })
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    error_type = %e.error_type,
                    error = %e.message,
                    "Invocation failed"
                );
                let uri = self.endpoints.invocation_error(&request_id);
                post_report(&mut self.client, uri, &ErrorReport::from(&e))?;
                Ok(StepOutcome::HandlerFailed { request_id })
            }
        }
    }

    fn poll(&mut self) -> io::Result<Result<Invocation, PollFailure>> {
        let request = match Request::get(self.endpoints.next_invocation()) {
            Ok(request) => request,
            Err(e) => {
                return Ok(Err(PollFailure {
                    request_id: None,
                    error: e.into(),
                }));
            }
        };

        let Collected { head, body, error } = roundtrip(&mut self.client, request)?;

        let Some(head) = head else {
            let error = error.unwrap_or(ClientError::Protocol(ProtocolError::ClosedBeforeHeader));
            return Ok(Err(PollFailure {
                request_id: None,
                error: error.into(),
            }));
        };
        if !head.is_success() {
            return Ok(Err(PollFailure {
                request_id: None,
                error: InvocationError::Status(head.status),
            }));
        }
        if let Some(error) = error {
            return Ok(Err(PollFailure {
                request_id: head.headers.joined(REQUEST_ID_HEADER).filter(|id| !id.is_empty()),
                error: error.into(),
            }));
        }

        Ok(Invocation::from_response(head, body).map_err(|error| PollFailure {
            request_id: None,
            error,
        }))
    }

    fn invoke(&mut self, invocation: &Invocation) -> Result<Vec<u8>, HandlerError> {
        let handler = &mut self.handler;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&invocation.payload))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                Err(HandlerError::new(error::RUNTIME_ERROR, message))
            }
        }
    }

    fn on_poll_failure(&mut self, failure: PollFailure) -> io::Result<StepOutcome> {
        let PollFailure { request_id, error } = failure;

        if let Some(request_id) = request_id {
            tracing::warn!(
                request_id = %request_id,
                error = %error,
                "Invocation could not be received"
            );
            let uri = self.endpoints.invocation_error(&request_id);
            post_report(&mut self.client, uri, &ErrorReport::runtime(error.to_string()))?;
            return Ok(StepOutcome::PollFailed {
                request_id: Some(request_id),
            });
        }

        self.poll_failures = self.poll_failures.saturating_add(1);
        let delay = self.backoff.delay(self.poll_failures);
        tracing::warn!(
            error = %error,
            failures = self.poll_failures,
            delay_ms = delay.as_millis() as u64,
            "Poll failed"
        );
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(StepOutcome::PollFailed { request_id: None })
    }
}

/// Runs a single exchange to completion.
///
/// Exchange failures are carried inside [`Collected`]; the outer error is a
/// multiplexer failure.
fn roundtrip(client: &mut HttpClient, request: Request) -> io::Result<Collected> {
    let exchange = match client.exchange(request) {
        Ok(exchange) => exchange,
        Err(e) => {
            return Ok(Collected {
                head: None,
                body: Bytes::new(),
                error: Some(e),
            });
        }
    };
    client.wait_all()?;
    Ok(exchange.collect())
}

fn post_report(client: &mut HttpClient, uri: Url, report: &ErrorReport) -> io::Result<bool> {
    match report.to_json() {
        Ok(json) => post_body(client, uri, Body::Text(json)),
        Err(e) => {
            tracing::error!(uri = %uri, error = %e, "Failed to encode error report");
            Ok(false)
        }
    }
}

/// POSTs `body` and logs anything but a 2xx answer. Returns whether the
/// runtime API accepted it.
fn post_body(client: &mut HttpClient, uri: Url, body: Body) -> io::Result<bool> {
    let request = match Request::post(uri.clone(), body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(uri = %uri, error = %e, "Report not sent");
            return Ok(false);
        }
    };

    let collected = roundtrip(client, request)?;
    match (collected.head, collected.error) {
        (_, Some(e)) => {
            tracing::warn!(uri = %uri, error = %e, "Report failed");
            Ok(false)
        }
        (Some(head), None) if head.is_success() => {
            tracing::debug!(uri = %uri, status = head.status, "Report accepted");
            Ok(true)
        }
        (Some(head), None) => {
            tracing::warn!(uri = %uri, status = head.status, "Report rejected");
            Ok(false)
        }
        (None, None) => Ok(false),
    }
}

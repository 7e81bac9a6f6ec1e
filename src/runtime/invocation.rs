use bytes::Bytes;

use crate::http::headers::HttpHeaders;
use crate::http::response::ResponseHead;
use crate::runtime::InvocationError;

pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
pub const DEADLINE_HEADER: &str = "Lambda-Runtime-Deadline-Ms";
pub const FUNCTION_ARN_HEADER: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const TRACE_ID_HEADER: &str = "Lambda-Runtime-Trace-Id";

/// One unit of work handed out by the runtime API.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub request_id: String,
    pub payload: Bytes,
    /// Headers of the poll response.
    pub headers: HttpHeaders,
}

impl Invocation {
    /// Builds an invocation from a completed poll response.
    ///
    /// Several request id values are joined with `,`; exactly one is
    /// expected.
    pub fn from_response(head: ResponseHead, payload: Bytes) -> Result<Self, InvocationError> {
        let request_id = head
            .headers
            .joined(REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty())
            .ok_or(InvocationError::MissingRequestId)?;

        Ok(Self {
            request_id,
            payload,
            headers: head.headers,
        })
    }

    /// Wall clock deadline in milliseconds since the epoch.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.headers.first(DEADLINE_HEADER)?.parse().ok()
    }

    pub fn function_arn(&self) -> Option<&str> {
        self.headers.first(FUNCTION_ARN_HEADER)
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.headers.first(TRACE_ID_HEADER)
    }
}

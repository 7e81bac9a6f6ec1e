use serde::Serialize;

use crate::runtime::handler::HandlerError;

/// Error type reported when the handler cannot be resolved.
pub const INIT_ERROR: &str = "InitError";
/// Error type reported for invocation failures not raised by the handler.
pub const RUNTIME_ERROR: &str = "RuntimeError";

/// Body posted to the init and invocation error endpoints.
///
/// Serializes to `{"errorMessage":"...","errorType":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_message: String,
    pub error_type: String,
}

impl ErrorReport {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            error_type: error_type.into(),
        }
    }

    pub fn init(error_message: impl Into<String>) -> Self {
        Self::new(INIT_ERROR, error_message)
    }

    pub fn runtime(error_message: impl Into<String>) -> Self {
        Self::new(RUNTIME_ERROR, error_message)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&HandlerError> for ErrorReport {
    fn from(e: &HandlerError) -> Self {
        Self::new(e.error_type.clone(), e.message.clone())
    }
}

//! Seam between the control loop and user code.
//!
//! Turning a `_HANDLER` reference into something callable is platform
//! specific; the loop only sees a [`HandlerResolver`] at init and a
//! [`Handler`] for every invocation afterwards.

use std::collections::HashMap;
use std::path::Path;

/// Failure raised by a handler, reported under its own error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error_type}: {message}")]
pub struct HandlerError {
    pub error_type: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

/// Raw bytes in, raw bytes out.
pub trait Handler {
    fn handle(&mut self, input: &[u8]) -> Result<Vec<u8>, HandlerError>;
}

impl<F> Handler for F
where
    F: FnMut(&[u8]) -> Result<Vec<u8>, HandlerError>,
{
    fn handle(&mut self, input: &[u8]) -> Result<Vec<u8>, HandlerError> {
        self(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("handler is not configured")]
    Missing,

    #[error("handler reference {0:?} is not of the form <module>::<entry>")]
    InvalidReference(String),

    #[error("handler {0:?} not found")]
    NotFound(String),
}

/// Resolves a handler reference once, at init.
pub trait HandlerResolver {
    fn resolve(
        &mut self,
        task_root: &Path,
        reference: &str,
    ) -> Result<Box<dyn Handler>, ResolveError>;
}

/// Splits `<module>::<entry>`.
pub fn parse_reference(reference: &str) -> Result<(&str, &str), ResolveError> {
    match reference.trim().split_once("::") {
        Some((module, entry)) if !module.is_empty() && !entry.is_empty() => Ok((module, entry)),
        _ => Err(ResolveError::InvalidReference(reference.to_string())),
    }
}

/// Table of handlers registered under their full reference.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, reference: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        self.handlers.insert(reference.into(), Box::new(handler));
        self
    }

    /// Same as [`register`](Self::register), for closures.
    pub fn register_fn<F>(&mut self, reference: impl Into<String>, handler: F) -> &mut Self
    where
        F: FnMut(&[u8]) -> Result<Vec<u8>, HandlerError> + 'static,
    {
        self.register(reference, handler)
    }
}

impl HandlerResolver for HandlerRegistry {
    fn resolve(
        &mut self,
        task_root: &Path,
        reference: &str,
    ) -> Result<Box<dyn Handler>, ResolveError> {
        let (module, entry) = parse_reference(reference)?;
        tracing::debug!(task_root = %task_root.display(), module, entry, "Resolving handler");

        self.handlers
            .remove(reference.trim())
            .ok_or_else(|| ResolveError::NotFound(reference.to_string()))
    }
}

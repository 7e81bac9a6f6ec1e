//! Lambda Bootstrap - custom runtime for the serverless runtime API
//!
//! Core library: a non-blocking HTTP/1.0 client on a readiness reactor and
//! the invocation loop built on top of it.

pub mod client;
pub mod config;
pub mod http;
pub mod runtime;

//! Core types for the courier HTTP request layer.
//!
//! This crate provides the transport-independent building blocks:
//! - [`Method`] - the HTTP verbs a request may use
//! - [`OutboundRequest`] - a fully built request as handed to a transport
//! - [`Response`] - a received reply with single-read body and error classification
//! - [`Body`] - a lazily read, type-erased response body
//! - [`Error`] and [`Result`] - error handling
//! - [`ErrorEnvelope`] and [`ErrorRegistry`] - per-status decoding of error payloads
//! - [`Transport`] - the trait a network backend implements
//! - [`families`] - error envelopes and registries of the known backends

mod body;
mod error;
pub mod families;
mod method;
pub mod prelude;
mod registry;
mod request;
mod response;
mod transport;

pub use body::{Body, ContentType, from_json, to_json};
pub use error::{Error, Result};
pub use method::Method;
pub use registry::{AsAny, ErrorEnvelope, ErrorRegistry};
pub use request::OutboundRequest;
pub use response::{ErrorCapture, NO_STATUS, Response};
pub use transport::Transport;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};

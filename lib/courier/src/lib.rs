//! Outbound HTTP request layer for backend API clients.
//!
//! A [`Client`] is built once per backend family. It owns a pooled hyper
//! transport, a retry policy and a base URL, and it hands out fluent
//! [`Request`]s. Sending a request runs it through retries with pre-retry
//! hooks and backoff. The terminal reply is classified, and error payloads are
//! decoded with the family's [`ErrorRegistry`].
//!
//! # Example
//!
//! ```ignore
//! use courier::prelude::*;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct Team {
//!     id: String,
//!     name: String,
//! }
//!
//! let client = Client::builder("https://api.example.com/v2")?
//!     .on_retry(|request| {
//!         request.set_header("Authorization", format!("Bearer {}", fresh_token()?));
//!         Ok(())
//!     })
//!     .build();
//!
//! let registry = ErrorRegistry::team();
//! let mut team = Team::default();
//! let response = client
//!     .new_request()
//!     .join_base_url("teams/t-1")
//!     .set_body_parse_object(&mut team)
//!     .set_error_parse_map(&registry)
//!     .send()
//!     .await?;
//!
//! if response.is_error() {
//!     eprintln!("{}", response.error_message().unwrap_or_default());
//! }
//! ```

mod client;
mod config;
mod connector;
pub mod middleware;
pub mod prelude;
mod request;
mod transport;

pub use client::{BoxedService, Client, ClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use request::Request;
pub use transport::{HyperTransport, ServiceFuture, TransportService};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use courier_core::{
    AsAny, Body, ContentType, Error, ErrorCapture, ErrorEnvelope, ErrorRegistry, Method,
    NO_STATUS, OutboundRequest, Response, Result, Transport, families, from_json, to_json,
};

// Re-export http types for status codes and headers
pub use courier_core::{StatusCode, header};

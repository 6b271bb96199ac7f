//! The network seam.
//!
//! A [`Transport`] performs exactly one attempt: it sends an
//! [`OutboundRequest`] and returns the reply with its body still unread.
//! Retrying, timeouts and logging are layered on top by the client.
//! Implement it to plug in another HTTP stack or a scripted fake for tests.

use std::future::Future;

use crate::{OutboundRequest, Response, Result};

/// Executes one HTTP attempt.
pub trait Transport: Send + Sync + 'static {
    /// Send the request and return the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if no reply was obtained:
    /// - Network errors
    /// - TLS errors
    /// - Invalid request
    fn execute(&self, request: OutboundRequest) -> impl Future<Output = Result<Response>> + Send;
}

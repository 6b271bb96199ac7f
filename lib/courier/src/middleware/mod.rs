//! Tower middleware of the client stack.
//!
//! Every request goes through, outermost first:
//!
//! - [`RetryLayer`] driven by a [`RetryPolicy`] (predicate, hooks, [`Backoff`])
//! - [`LoggingLayer`] when enabled, logging each attempt with `tracing`
//! - the transport service, which bounds each attempt by its timeout
//!
//! The [`ClientBuilder`](crate::ClientBuilder) assembles this stack. The
//! pieces are public for callers who compose their own services.

mod backoff;
mod logging;
mod retry;

pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff};
pub use logging::{LogLevel, Logging, LoggingLayer};
pub use retry::{RetryHook, RetryPolicy, RetryPredicate, default_retry_predicate};

// Re-export tower types for convenience
pub use tower::retry::RetryLayer;
pub use tower::{Layer, ServiceBuilder};

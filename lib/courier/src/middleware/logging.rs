//! Per-attempt logging middleware.
//!
//! Sits below the retry layer, so every attempt is logged on its own.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use courier_core::{Error, OutboundRequest, Response, Result};
use tower::{Layer, Service};
use tracing::{Instrument, Level, debug, info, span, warn};

/// Layer that adds attempt logging.
///
/// # Example
///
/// ```ignore
/// use courier::middleware::LoggingLayer;
/// use tower::ServiceBuilder;
///
/// let service = ServiceBuilder::new()
///     .layer(LoggingLayer::new())
///     .service(transport_service);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

/// Log level for the logging middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level, headers included.
    Debug,
    /// Log at info level (summary only).
    #[default]
    Info,
}

impl LoggingLayer {
    /// Create a new logging layer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging layer that logs at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// Configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

/// Service that logs attempts and their outcome.
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
}

impl<S> Service<OutboundRequest> for Logging<S>
where
    S: Service<OutboundRequest, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: OutboundRequest) -> Self::Future {
        let method = request.method();
        let url = request.url().to_string();
        let level = self.level;

        let span = span!(Level::INFO, "http_request", %method, %url);

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let start = Instant::now();

                match level {
                    LogLevel::Debug => {
                        debug!(headers = ?request.headers(), "sending request");
                    }
                    LogLevel::Info => {
                        info!("sending request");
                    }
                }

                let result = inner.call(request).await;
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) if response.is_error() => {
                        warn!(
                            status = response.status_code(),
                            elapsed_ms, "request failed with HTTP error"
                        );
                    }
                    Ok(response) => {
                        if level == LogLevel::Debug {
                            debug!(
                                status = response.status_code(),
                                headers = ?response.headers(),
                                elapsed_ms,
                                "request completed"
                            );
                        } else {
                            info!(status = response.status_code(), elapsed_ms, "request completed");
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, elapsed_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

//! Retry policy with a pluggable predicate, pre-retry hooks and backoff.
//!
//! [`RetryPolicy`] plugs into tower's [`RetryLayer`](tower::retry::RetryLayer).
//! After every attempt it asks the predicate whether the outcome is worth
//! another try. If so, and attempts remain, it releases the previous reply,
//! runs each hook on the request about to be resent and sleeps the backoff
//! delay. When the budget runs out on a retryable outcome the result becomes
//! [`Error::RetriesExhausted`].

use std::fmt;
use std::sync::Arc;

use courier_core::{Error, OutboundRequest, Response, Result};
use tokio::time::Sleep;
use tower::retry::Policy;
use tracing::{debug, warn};

use super::{Backoff, ExponentialBackoff};

/// Decides whether an attempt's outcome should be retried.
pub type RetryPredicate = Arc<dyn Fn(&Result<Response>) -> bool + Send + Sync>;

/// Prepares the request before it is resent.
///
/// Hooks run in registration order, on the request of the next attempt. An
/// `Err` stops retrying and is returned to the caller as [`Error::Hook`].
pub type RetryHook = Arc<dyn Fn(&mut OutboundRequest) -> Result<()> + Send + Sync>;

/// Default retry predicate.
///
/// Retries connection failures, timeouts, missing replies, `429` and every
/// `5xx` except `501 Not Implemented`.
#[must_use]
pub fn default_retry_predicate(result: &Result<Response>) -> bool {
    match result {
        Ok(response) => match response.status() {
            None => true,
            Some(status) => status == 429 || (status >= 500 && status != 501),
        },
        Err(error) => error.is_retryable_transport(),
    }
}

/// Retry policy for the client's tower stack.
///
/// # Example
///
/// ```ignore
/// use courier::middleware::{ConstantBackoff, RetryLayer, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3)
///     .with_backoff(ConstantBackoff(Duration::from_millis(100)))
///     .with_hook(|request| {
///         request.set_header("X-Retry", "true");
///         Ok(())
///     });
/// let layer = RetryLayer::new(policy);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    attempts_made: u32,
    predicate: RetryPredicate,
    hooks: Arc<[RetryHook]>,
    backoff: Arc<dyn Backoff>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("attempts_made", &self.attempts_made)
            .field("hooks", &self.hooks.len())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` attempts in total.
    ///
    /// Uses [`default_retry_predicate`], [`ExponentialBackoff::default`] and
    /// no hooks. `0` is treated as `1`.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            attempts_made: 0,
            predicate: Arc::new(default_retry_predicate),
            hooks: Arc::from(Vec::new()),
            backoff: Arc::new(ExponentialBackoff::default()),
        }
    }

    /// Replace the retry predicate.
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Result<Response>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Append a pre-retry hook.
    #[must_use]
    pub fn with_hook<F>(self, hook: F) -> Self
    where
        F: Fn(&mut OutboundRequest) -> Result<()> + Send + Sync + 'static,
    {
        self.with_hooks([Arc::new(hook) as RetryHook])
    }

    /// Append several pre-retry hooks, keeping their order.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = RetryHook>) -> Self {
        self.hooks = self.hooks.iter().cloned().chain(hooks).collect();
        self
    }

    /// Replace the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: impl Backoff) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Total attempts allowed per request.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn run_hooks(&self, request: &mut OutboundRequest) -> Result<()> {
        self.hooks.iter().try_for_each(|hook| {
            hook(request).map_err(|err| match err {
                Error::Hook(_) => err,
                other => Error::hook(other.to_string()),
            })
        })
    }
}

impl Policy<OutboundRequest, Response, Error> for RetryPolicy {
    type Future = Sleep;

    fn retry(
        &mut self,
        req: &mut OutboundRequest,
        result: &mut Result<Response>,
    ) -> Option<Self::Future> {
        self.attempts_made += 1;

        if !(self.predicate)(result) {
            return None;
        }

        if self.attempts_made >= self.max_attempts {
            let (last_status, last_error) = match result {
                Ok(response) => (response.status(), None),
                Err(error) => (None, Some(error.to_string())),
            };
            warn!(
                method = %req.method(),
                url = %req.url(),
                attempts = self.attempts_made,
                ?last_status,
                ?last_error,
                "giving up"
            );
            *result = Err(Error::RetriesExhausted {
                method: req.method(),
                attempts: self.attempts_made,
                last_status,
                last_error,
            });
            return None;
        }

        let delay = self
            .backoff
            .delay(self.attempts_made - 1, result.as_ref().ok());

        if let Ok(response) = result {
            response.discard();
        }

        if let Err(error) = self.run_hooks(req) {
            warn!(method = %req.method(), url = %req.url(), %error, "pre-retry hook failed");
            *result = Err(error);
            return None;
        }

        debug!(
            method = %req.method(),
            url = %req.url(),
            attempt = self.attempts_made,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying"
        );

        Some(tokio::time::sleep(delay))
    }

    fn clone_request(&mut self, req: &OutboundRequest) -> Option<OutboundRequest> {
        Some(req.clone())
    }
}

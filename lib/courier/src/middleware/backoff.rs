//! Delays between retry attempts.

use std::fmt;
use std::time::Duration;

use courier_core::Response;

/// Computes how long to wait before the next attempt.
pub trait Backoff: fmt::Debug + Send + Sync + 'static {
    /// Delay before retry number `retry` (0 for the first retry).
    ///
    /// `reply` is the reply being retried past, if the attempt got one.
    fn delay(&self, retry: u32, reply: Option<&Response>) -> Duration;
}

/// Exponential backoff: `initial * multiplier^retry`, capped at `max`.
///
/// A 429 or 503 reply carrying `Retry-After: <seconds>` overrides the
/// computed delay, still capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound of any delay.
    pub max: Duration,
    /// Growth factor between retries.
    pub multiplier: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ExponentialBackoff {
    fn computed(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);

        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 0.0 {
            self.multiplier
        } else {
            1.0
        };

        let max_secs = self.max.as_secs_f64();
        let secs = self.initial.as_secs_f64() * multiplier.powi(exponent);

        if secs.is_finite() {
            Duration::from_secs_f64(secs.clamp(0.0, max_secs))
        } else {
            self.max
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, retry: u32, reply: Option<&Response>) -> Duration {
        reply
            .and_then(retry_after)
            .map_or_else(|| self.computed(retry), |hint| hint.min(self.max))
    }
}

/// The same delay before every retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantBackoff(pub Duration);

impl Backoff for ConstantBackoff {
    fn delay(&self, _retry: u32, _reply: Option<&Response>) -> Duration {
        self.0
    }
}

/// `Retry-After` in seconds, read from 429 and 503 replies only.
fn retry_after(reply: &Response) -> Option<Duration> {
    if !matches!(reply.status(), Some(429 | 503)) {
        return None;
    }
    reply
        .header("retry-after")?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use courier_core::Body;

    use super::*;

    fn reply(status: u16, retry_after: Option<&str>) -> Response {
        let mut headers = HashMap::new();
        if let Some(value) = retry_after {
            headers.insert("retry-after".to_string(), value.to_string());
        }
        Response::from_parts(status, headers, Body::empty())
    }

    #[test]
    fn exponential_doubles_until_max() {
        let backoff = ExponentialBackoff::default();

        assert_eq!(backoff.delay(0, None), Duration::from_secs(1));
        assert_eq!(backoff.delay(1, None), Duration::from_secs(2));
        assert_eq!(backoff.delay(3, None), Duration::from_secs(8));
        assert_eq!(backoff.delay(10, None), Duration::from_secs(30));
        assert_eq!(backoff.delay(u32::MAX, None), Duration::from_secs(30));
    }

    #[test]
    fn retry_after_overrides_on_429_and_503() {
        let backoff = ExponentialBackoff::default();

        assert_eq!(
            backoff.delay(0, Some(&reply(429, Some("4")))),
            Duration::from_secs(4)
        );
        assert_eq!(
            backoff.delay(0, Some(&reply(503, Some(" 6 ")))),
            Duration::from_secs(6)
        );
    }

    #[test]
    fn retry_after_is_capped() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(
            backoff.delay(0, Some(&reply(429, Some("3600")))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn retry_after_ignored_elsewhere() {
        let backoff = ExponentialBackoff::default();

        assert_eq!(
            backoff.delay(1, Some(&reply(500, Some("9")))),
            Duration::from_secs(2)
        );
        assert_eq!(
            backoff.delay(1, Some(&reply(429, Some("Wed, 21 Oct 2015 07:28:00 GMT")))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn constant_ignores_everything() {
        let backoff = ConstantBackoff(Duration::from_millis(250));
        assert_eq!(backoff.delay(0, None), Duration::from_millis(250));
        assert_eq!(
            backoff.delay(7, Some(&reply(429, Some("10")))),
            Duration::from_millis(250)
        );
    }
}

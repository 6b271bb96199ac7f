//! The client: one transport, one retry configuration, one base URL.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_core::{Error, OutboundRequest, Response, Result, Transport};
use tower::retry::RetryLayer;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};
use url::Url;

use crate::{
    ClientConfig, ClientConfigBuilder, Request,
    middleware::{Backoff, LoggingLayer, RetryHook, RetryPolicy, RetryPredicate},
    transport::{HyperTransport, TransportService},
};

/// Type-erased client stack.
pub type BoxedService = BoxCloneService<OutboundRequest, Response, Error>;

/// Thread-safe wrapper for [`BoxedService`].
///
/// The Mutex makes the service `Sync`. It is held only long enough to clone
/// the service for one call.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: OutboundRequest) -> Pin<Box<dyn Future<Output = Result<Response>> + Send>> {
        let service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(service.oneshot(request))
    }
}

struct ClientInner {
    base_url: Url,
    service: SyncService,
    config: ClientConfig,
    default_headers: HashMap<String, String>,
}

/// HTTP client for one backend family.
///
/// Cheap to clone and safe to share across tasks. Retry behavior is fixed
/// when the client is built.
///
/// # Example
///
/// ```ignore
/// use courier::{Client, ErrorRegistry, Method};
///
/// let client = Client::builder("https://api.example.com/v2")?
///     .max_attempts(3)
///     .with_logging()
///     .build();
///
/// let registry = ErrorRegistry::team();
/// let mut team = Team::default();
/// let response = client
///     .new_request()
///     .method(Method::Get)
///     .join_base_url("teams/t-1")
///     .set_bearer_auth("token")
///     .set_body_parse_object(&mut team)
///     .set_error_parse_map(&registry)
///     .send()
///     .await?;
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("config", &self.inner.config)
            .field("default_headers", &self.inner.default_headers)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with default configuration over the hyper transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self::builder(base_url)?.build())
    }

    /// Create a client with default configuration over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `base_url` does not parse.
    pub fn with_transport<T: Transport>(base_url: &str, transport: T) -> Result<Self> {
        Ok(Self::builder(base_url)?.transport(transport).build())
    }

    /// Start building a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `base_url` does not parse.
    pub fn builder(base_url: &str) -> Result<ClientBuilder> {
        Ok(ClientBuilder::new(Url::parse(base_url)?))
    }

    /// Start a request at the base URL, with `Content-Type: application/json`
    /// and the client's default headers.
    #[must_use]
    pub fn new_request<'a>(&self) -> Request<'a> {
        Request::new(self.clone())
    }

    /// Base URL every request starts from.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Headers added to every request.
    #[must_use]
    pub fn default_headers(&self) -> &HashMap<String, String> {
        &self.inner.default_headers
    }

    pub(crate) async fn execute(&self, request: OutboundRequest) -> Result<Response> {
        self.inner.service.call(request).await
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    base_url: Url,
    config: ClientConfigBuilder,
    transport: Option<BoxedService>,
    logging: Option<LoggingLayer>,
    default_headers: HashMap<String, String>,
    predicate: Option<RetryPredicate>,
    hooks: Vec<RetryHook>,
    backoff: Option<Arc<dyn Backoff>>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url.as_str())
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("logging", &self.logging)
            .field("default_headers", &self.default_headers)
            .field("hooks_count", &self.hooks.len())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    fn new(base_url: Url) -> Self {
        Self {
            base_url,
            config: ClientConfig::builder(),
            transport: None,
            logging: None,
            default_headers: HashMap::new(),
            predicate: None,
            hooks: Vec::new(),
            backoff: None,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = ClientConfig::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_per_host(config.pool_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .max_attempts(config.max_attempts);
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Set the total number of attempts per request, the first one included.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config = self.config.max_attempts(attempts);
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Replace the default retry predicate.
    #[must_use]
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Result<Response>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Append a pre-retry hook. Hooks run in the order they were added.
    #[must_use]
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut OutboundRequest) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Replace the default exponential backoff.
    #[must_use]
    pub fn backoff(mut self, backoff: impl Backoff) -> Self {
        self.backoff = Some(Arc::new(backoff));
        self
    }

    /// Send attempts through `transport` instead of the hyper transport.
    #[must_use]
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(BoxCloneService::new(TransportService::new(transport)));
        self
    }

    /// Log every attempt at info level.
    #[must_use]
    pub fn with_logging(mut self) -> Self {
        self.logging = Some(LoggingLayer::new());
        self
    }

    /// Log every attempt at debug level, headers included.
    #[must_use]
    pub fn with_debug_logging(mut self) -> Self {
        self.logging = Some(LoggingLayer::debug());
        self
    }

    fn retry_policy(&mut self, max_attempts: u32) -> RetryPolicy {
        let mut policy = RetryPolicy::new(max_attempts).with_hooks(self.hooks.drain(..));
        if let Some(predicate) = self.predicate.take() {
            policy = policy.with_predicate(move |result| predicate(result));
        }
        if let Some(backoff) = self.backoff.take() {
            policy = policy.with_backoff(SharedBackoff(backoff));
        }
        policy
    }

    /// Build the client.
    #[must_use]
    pub fn build(mut self) -> Client {
        let config = self.config.clone().build();
        let policy = self.retry_policy(config.max_attempts);

        let mut service: BoxedService = self.transport.take().unwrap_or_else(|| {
            BoxCloneService::new(TransportService::new(HyperTransport::new(&config)))
        });

        if let Some(logging) = self.logging {
            service = BoxCloneService::new(logging.layer(service));
        }

        service = BoxCloneService::new(RetryLayer::new(policy).layer(service));

        Client {
            inner: Arc::new(ClientInner {
                base_url: self.base_url,
                service: SyncService::new(service),
                config,
                default_headers: self.default_headers,
            }),
        }
    }
}

#[derive(Debug)]
struct SharedBackoff(Arc<dyn Backoff>);

impl Backoff for SharedBackoff {
    fn delay(&self, retry: u32, reply: Option<&Response>) -> Duration {
        self.0.delay(retry, reply)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;
    use crate::middleware::ConstantBackoff;

    #[tokio::test]
    async fn client_defaults() {
        let client = Client::new("https://api.example.com/v2").expect("valid URL");

        check!(client.base_url().as_str() == "https://api.example.com/v2");
        check!(client.config().timeout == Duration::from_secs(30));
        check!(client.config().max_attempts == 5);
        check!(client.default_headers().is_empty());
    }

    #[tokio::test]
    async fn client_builder() {
        let client = Client::builder("https://api.example.com")
            .expect("valid URL")
            .timeout(Duration::from_secs(60))
            .pool_idle_per_host(16)
            .max_attempts(2)
            .default_header("X-Client", "courier")
            .backoff(ConstantBackoff(Duration::ZERO))
            .with_logging()
            .build();

        check!(client.config().timeout == Duration::from_secs(60));
        check!(client.config().pool_idle_per_host == 16);
        check!(client.config().max_attempts == 2);
        check!(client.default_headers().get("X-Client").map(String::as_str) == Some("courier"));
    }

    #[test]
    fn invalid_base_url() {
        let_assert!(Err(Error::InvalidUrl(_)) = Client::builder("not a url"));
    }

    #[tokio::test]
    async fn client_is_clone_and_debug() {
        let client = Client::new("https://api.example.com").expect("valid URL");
        let cloned = client.clone();
        check!(format!("{cloned:?}").contains("Client"));
    }
}

//! hyper-util transport and the per-attempt timeout service.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use courier_core::{Body, Error, OutboundRequest, Response, Result, Transport};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower_service::Service;

use crate::{ClientConfig, connector::https_connector};

/// Pooled HTTP/1.1 and HTTP/2 transport over rustls.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a transport with the pool and connect settings of `config`.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(https_connector(config));

        Self { inner }
    }

    fn build_hyper_request(request: OutboundRequest) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body) = request.into_parts();

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(body.map_or_else(Full::default, Full::new))
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    /// Readable headers, keyed by lowercase name. A repeated header keeps its
    /// first value.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        let mut extracted = HashMap::with_capacity(headers.keys_len());
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                extracted
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
        extracted
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = cause_chain(&err);

        if is_tls_failure(&err) {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

/// Next cause, looking through the payload of `io::Error`.
///
/// `io::Error::source` skips its own payload, which is where rustls errors
/// end up.
fn next_cause<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
    match err.downcast_ref::<io::Error>() {
        Some(io_err) => io_err.get_ref().map(|inner| inner as &(dyn StdError + 'static)),
        None => err.source(),
    }
}

fn causes<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |err| next_cause(*err))
}

/// Every message of the cause chain, joined with `": "`.
fn cause_chain(err: &(dyn StdError + 'static)) -> String {
    let mut messages: Vec<String> = Vec::new();
    for cause in causes(err) {
        let message = cause.to_string();
        // io wrappers display their payload, skip the repeat
        if messages.last() != Some(&message) {
            messages.push(message);
        }
    }
    messages.join(": ")
}

fn is_tls_failure(err: &(dyn StdError + 'static)) -> bool {
    causes(err).any(|cause| {
        cause.is::<rustls::Error>() || {
            let msg = cause.to_string().to_ascii_lowercase();
            msg.contains("certificate") || msg.contains("tls handshake")
        }
    })
}

impl Transport for HyperTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<Response> {
        let hyper_request = Self::build_hyper_request(request)?;

        let response = self
            .inner
            .request(hyper_request)
            .await
            .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(response.headers());

        // The body stays a stream until the caller reads it.
        let body = response
            .into_body()
            .map_err(|e| Error::connection(e.to_string()))
            .boxed_unsync();

        Ok(Response::from_parts(status, headers, Body::from_boxed(body)))
    }
}

/// Future returned by [`TransportService`].
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// Tower service running one attempt on a [`Transport`].
///
/// The attempt is bounded by the request's timeout and fails with
/// [`Error::Timeout`] once it elapses.
pub struct TransportService<T> {
    transport: Arc<T>,
}

impl<T> TransportService<T> {
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }
}

impl<T> Clone for TransportService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Service<OutboundRequest> for TransportService<T> {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: OutboundRequest) -> Self::Future {
        let transport = Arc::clone(&self.transport);
        Box::pin(async move {
            match request.timeout() {
                Some(limit) => tokio::time::timeout(limit, transport.execute(request))
                    .await
                    .map_err(|_| Error::Timeout)?,
                None => transport.execute(request).await,
            }
        })
    }
}

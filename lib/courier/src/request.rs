//! Fluent request builder.
//!
//! A [`Request`] is created by [`Client::new_request`], configured with
//! chained calls, and consumed by [`Request::send`]. Errors found while
//! building (an unparsable URL, a body that does not serialize) are kept and
//! returned by `send`, so the chain never breaks.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use courier_core::{
    ContentType, Error, ErrorCapture, ErrorRegistry, Method, OutboundRequest, Response, Result,
    from_json, header, to_json,
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;
use url::Url;

use crate::Client;

type DecodeTarget<'a> = Box<dyn FnOnce(&[u8]) -> Result<()> + Send + 'a>;

/// A single-use HTTP request bound to a [`Client`].
///
/// The lifetime `'a` covers the borrowed success target and error registry.
#[must_use = "a request does nothing until `send` is awaited"]
pub struct Request<'a> {
    client: Client,
    inner: OutboundRequest,
    timeout: Option<Duration>,
    deferred: Option<Error>,
    target: Option<DecodeTarget<'a>>,
    errors: Option<&'a ErrorRegistry>,
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.inner.method())
            .field("url", &self.inner.url().as_str())
            .field("headers", self.inner.headers())
            .field("timeout", &self.timeout)
            .field("deferred", &self.deferred)
            .field("has_target", &self.target.is_some())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<'a> Request<'a> {
    pub(crate) fn new(client: Client) -> Self {
        let mut inner = OutboundRequest::new(Method::default(), client.base_url().clone())
            .with_header(header::CONTENT_TYPE.as_str(), ContentType::Json.as_str());
        for (name, value) in client.default_headers() {
            inner.set_header(name.as_str(), value.as_str());
        }

        Self {
            client,
            inner,
            timeout: None,
            deferred: None,
            target: None,
            errors: None,
        }
    }

    fn defer(&mut self, error: Error) {
        if self.deferred.is_none() {
            self.deferred = Some(error);
        }
    }

    /// Set the HTTP method. Defaults to `GET`.
    pub fn method(mut self, method: Method) -> Self {
        self.inner = self.inner.with_method(method);
        self
    }

    /// Replace the URL with an absolute one.
    ///
    /// The query string already set on the request is kept, and a query in
    /// `url` is ignored. A parse failure is returned by [`send`](Self::send).
    pub fn url(mut self, url: &str) -> Self {
        match Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_query(self.inner.url().query());
                *self.inner.url_mut() = parsed;
            }
            Err(err) => self.defer(err.into()),
        }
        self
    }

    /// Append path segments to the current URL.
    ///
    /// Empty and `.` segments are skipped, so duplicate slashes collapse, and
    /// `..` drops the previous segment. A trailing `/` on `path` is kept, and
    /// so is the query string.
    pub fn join_base_url(mut self, path: &str) -> Self {
        let url = self.inner.url_mut();
        let joined = url.path_segments_mut().map(|mut segments| {
            segments.pop_if_empty();
            for segment in path.split('/') {
                match segment {
                    "" | "." => {}
                    ".." => {
                        segments.pop();
                    }
                    segment => {
                        segments.push(segment);
                    }
                }
            }
        });

        match joined {
            Ok(()) if path.ends_with('/') && !url.path().ends_with('/') => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.push("");
                }
            }
            Ok(()) => {}
            Err(()) => {
                let message = format!("cannot join a path onto {url}");
                self.defer(Error::invalid_request(message));
            }
        }
        self
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.set_header(name, value);
        self
    }

    /// Set a query parameter. An empty `value` removes the parameter.
    ///
    /// Only `name` is replaced: repeated values of other parameters survive.
    /// Parameters are kept sorted by name.
    pub fn set_query_param(mut self, name: &str, value: &str) -> Self {
        let url = self.inner.url_mut();
        let mut params: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        params.retain(|(key, _)| key != name);
        if !value.is_empty() {
            params.push((name.to_string(), value.to_string()));
        }
        params.sort_by(|(left, _), (right, _)| left.cmp(right));

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(&params);
        }
        self
    }

    /// Set several query parameters, with the rules of
    /// [`set_query_param`](Self::set_query_param).
    pub fn set_query_params<K, V>(self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        params.into_iter().fold(self, |request, (name, value)| {
            request.set_query_param(name.as_ref(), value.as_ref())
        })
    }

    /// `Authorization: Basic <base64(user:password)>`.
    pub fn set_basic_auth(self, username: &str, password: &str) -> Self {
        let credentials = STANDARD.encode(format!("{username}:{password}"));
        self.set_header(header::AUTHORIZATION.as_str(), format!("Basic {credentials}"))
    }

    /// `Authorization: Bearer <token>`.
    pub fn set_bearer_auth(self, token: &str) -> Self {
        self.set_header(header::AUTHORIZATION.as_str(), format!("Bearer {token}"))
    }

    /// `Authorization: OAuth2 <token>`.
    pub fn set_oauth2_auth(self, token: &str) -> Self {
        self.set_header(header::AUTHORIZATION.as_str(), format!("OAuth2 {token}"))
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// A serialization failure is returned by [`send`](Self::send).
    pub fn set_body<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match to_json(body) {
            Ok(bytes) => self.inner = self.inner.with_body(Some(bytes)),
            Err(err) => self.defer(err),
        }
        self
    }

    /// Decode a successful reply's body into `target`.
    pub fn set_body_parse_object<T>(mut self, target: &'a mut T) -> Self
    where
        T: DeserializeOwned + Send,
    {
        self.target = Some(Box::new(move |bytes: &[u8]| {
            *target = from_json(bytes)?;
            Ok(())
        }));
        self
    }

    /// Decode error replies with `registry`.
    pub fn set_error_parse_map(mut self, registry: &'a ErrorRegistry) -> Self {
        self.errors = Some(registry);
        self
    }

    /// Override the client's per-attempt timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// URL the request will be sent to.
    #[must_use]
    pub fn current_url(&self) -> &Url {
        self.inner.url()
    }

    /// Header value, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.header(name)
    }

    /// Send the request through the client's retry stack.
    ///
    /// An error reply (no status, or 400 and above) is still `Ok`: its body is
    /// captured as [`Response::error_body`] and, when the registry knows the
    /// status, decoded into [`Response::decoded_error`]. A successful reply is
    /// decoded into the target set with
    /// [`set_body_parse_object`](Self::set_body_parse_object), if any; its body
    /// is consumed in that case.
    ///
    /// # Errors
    ///
    /// - a deferred build error (URL, body serialization)
    /// - transport failures, [`Error::RetriesExhausted`] and [`Error::Hook`]
    /// - [`Error::JsonDeserialization`] when the success target rejects the body
    pub async fn send(self) -> Result<Response> {
        let Self {
            client,
            inner,
            timeout,
            deferred,
            target,
            errors,
        } = self;

        if let Some(error) = deferred {
            return Err(error);
        }

        let request = inner.with_timeout(timeout.or(Some(client.config().timeout)));
        let mut response = client.execute(request).await?;

        if response.is_error() {
            let status = response.status_code();
            match response.capture_error(errors).await? {
                ErrorCapture::Decoded => debug!(status, "decoded error reply"),
                ErrorCapture::Unmapped => debug!(status, "no decoder for status, kept raw error body"),
                ErrorCapture::Undecodable(error) => {
                    debug!(status, %error, "error reply does not match its envelope, kept raw error body");
                }
            }
        } else if let Some(decode) = target {
            let bytes = response.body().await?;
            decode(&bytes[..])?;
        }

        Ok(response)
    }

    /// Like [`send`](Self::send), but gives up with [`Error::Cancelled`] as
    /// soon as `cancel` completes.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus [`Error::Cancelled`].
    pub async fn send_until(self, cancel: impl Future<Output = ()>) -> Result<Response> {
        tokio::select! {
            biased;
            () = cancel => Err(Error::Cancelled),
            result = self.send() => result,
        }
    }
}

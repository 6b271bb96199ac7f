//! The request a transport executes.
//!
//! [`OutboundRequest`] is what remains of a fluent request once it has been
//! built: method, URL, headers, body and an optional per-attempt timeout.
//! Pre-retry hooks receive it mutably between attempts.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::Method;

/// An HTTP request with method, URL, headers, and optional body.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: Method,
    url: Url,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl OutboundRequest {
    /// Creates a request without headers or body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Sets the HTTP method.
    #[must_use]
    pub const fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets a header, replacing any header with the same name in any casing.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: Option<Bytes>) -> Self {
        self.body = body;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Mutable access to the URL.
    #[must_use]
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a header, replacing any header with the same name in any casing.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Per-attempt timeout, if one is set.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, Url, HashMap<String, String>, Option<Bytes>) {
        (self.method, self.url, self.headers, self.body)
    }
}

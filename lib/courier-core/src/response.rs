//! HTTP response handling.
//!
//! [`Response`] wraps one reply. Its status drives the single error
//! classification rule ([`Response::is_error`]), and its body is a stream that
//! can be read exactly once.
//!
//! # Example
//!
//! ```ignore
//! let mut response = request.send().await?;
//! if response.is_error() {
//!     eprintln!("{}", response.error_message().unwrap_or_default());
//! } else {
//!     let team: Team = response.json().await?;
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::{Body, Error, ErrorEnvelope, ErrorRegistry, Result, from_json};

/// Status code reported when no reply was received.
pub const NO_STATUS: i32 = -1;

#[derive(Debug)]
enum BodyState {
    Unread(Body),
    Consumed,
}

/// How an error reply's body was captured.
#[derive(Debug)]
pub enum ErrorCapture {
    /// The registry decoded the body into its envelope for this status.
    Decoded,
    /// No registry, or no decoder for this status: the raw text was kept.
    Unmapped,
    /// A decoder was registered but rejected the body: the raw text was kept.
    Undecodable(Error),
}

/// HTTP response with status, headers, and a single-read body.
pub struct Response {
    status: Option<u16>,
    headers: HashMap<String, String>,
    body: BodyState,
    error_body: Option<String>,
    decoded_error: Option<Box<dyn ErrorEnvelope>>,
}

impl Response {
    /// Creates a response from a received reply.
    #[must_use]
    pub fn from_parts(status: u16, headers: HashMap<String, String>, body: Body) -> Self {
        Self {
            status: Some(status),
            headers,
            body: BodyState::Unread(body),
            error_body: None,
            decoded_error: None,
        }
    }

    /// Creates a response standing for "no reply received".
    ///
    /// Its status is [`NO_STATUS`] and it is always classified as an error.
    #[must_use]
    pub fn no_reply() -> Self {
        Self {
            status: None,
            headers: HashMap::new(),
            body: BodyState::Unread(Body::empty()),
            error_body: None,
            decoded_error: None,
        }
    }

    /// HTTP status code, or [`NO_STATUS`] when no reply was received.
    #[must_use]
    pub fn status_code(&self) -> i32 {
        self.status.map_or(NO_STATUS, i32::from)
    }

    /// HTTP status code, `None` when no reply was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns `true` when no reply was received or the status is 400 or above.
    ///
    /// This is the classification every caller relies on.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_none_or(|status| status > 399)
    }

    /// Status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|status| (200..300).contains(&status))
    }

    /// Status is 4xx.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status.is_some_and(|status| (400..500).contains(&status))
    }

    /// Status is 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status.is_some_and(|status| status >= 500)
    }

    /// Response headers. A header sent several times keeps its first value.
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

    /// Read the whole body.
    ///
    /// The body is read once. Any later call, or a call after
    /// [`discard`](Self::discard), returns [`Error::BodyConsumed`]. When an
    /// error reply's body was captured during `send`, it is available through
    /// [`error_body`](Self::error_body) instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyConsumed`] on a second read, or the transport error
    /// raised while streaming the body.
    pub async fn body(&mut self) -> Result<Bytes> {
        match std::mem::replace(&mut self.body, BodyState::Consumed) {
            BodyState::Unread(body) => body.collect().await,
            BodyState::Consumed => Err(Error::BodyConsumed),
        }
    }

    /// Read the whole body as text, replacing invalid UTF-8 sequences.
    ///
    /// # Errors
    ///
    /// Same as [`body`](Self::body).
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.body().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the whole body and deserialize it as JSON.
    ///
    /// # Errors
    ///
    /// Same as [`body`](Self::body), plus a deserialization error.
    pub async fn json<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.body().await?;
        from_json(&bytes)
    }

    /// Release the body without reading it.
    ///
    /// Safe to call any number of times, on any response.
    pub fn discard(&mut self) {
        self.body = BodyState::Consumed;
    }

    /// Returns `true` once the body was read or discarded.
    #[must_use]
    pub const fn is_body_consumed(&self) -> bool {
        matches!(self.body, BodyState::Consumed)
    }

    /// Raw text of an error reply, captured during `send`.
    #[must_use]
    pub fn error_body(&self) -> Option<&str> {
        self.error_body.as_deref()
    }

    /// The structured error decoded from an error reply, if a registry matched.
    #[must_use]
    pub fn decoded_error(&self) -> Option<&dyn ErrorEnvelope> {
        self.decoded_error.as_deref()
    }

    /// Human-readable message of an error reply.
    ///
    /// The decoded envelope's message when there is one, the raw error body
    /// otherwise.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.decoded_error
            .as_deref()
            .map(|envelope| envelope.message())
            .or_else(|| self.error_body.clone())
    }

    /// Read an error reply's body and keep it for later inspection.
    ///
    /// The raw text always becomes [`error_body`](Self::error_body). When
    /// `registry` has a decoder for this status and it accepts the body, the
    /// envelope becomes [`decoded_error`](Self::decoded_error). A missing or
    /// failing decoder is reported through the returned [`ErrorCapture`], never
    /// as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the body itself cannot be read.
    pub async fn capture_error(&mut self, registry: Option<&ErrorRegistry>) -> Result<ErrorCapture> {
        let bytes = self.body().await?;
        self.error_body = Some(String::from_utf8_lossy(&bytes).into_owned());

        let decoded = self
            .status
            .zip(registry)
            .and_then(|(status, registry)| registry.decode(status, &bytes));

        Ok(match decoded {
            Some(Ok(envelope)) => {
                self.decoded_error = Some(envelope);
                ErrorCapture::Decoded
            }
            Some(Err(err)) => ErrorCapture::Undecodable(err),
            None => ErrorCapture::Unmapped,
        })
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status_code())
            .field("headers", &self.headers)
            .field("body_consumed", &self.is_body_consumed())
            .field("error_body", &self.error_body)
            .field("decoded_error", &self.decoded_error)
            .finish()
    }
}

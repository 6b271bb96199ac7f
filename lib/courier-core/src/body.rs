//! Body types and serialization utilities.

use std::fmt;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::UnsyncBoxBody};

use crate::{Error, Result};

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A response body that has not been read yet.
///
/// The body is a stream. Reading it with [`Body::collect`] consumes it, and
/// dropping it releases the underlying connection resource.
pub struct Body(UnsyncBoxBody<Bytes, Error>);

impl Body {
    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    /// Wrap a boxed body produced by a transport.
    #[must_use]
    pub fn from_boxed(inner: UnsyncBoxBody<Bytes, Error>) -> Self {
        Self(inner)
    }

    /// Read the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns the transport error raised while reading a chunk.
    pub async fn collect(self) -> Result<Bytes> {
        let collected = self.0.collect().await?;
        Ok(collected.to_bytes())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self(Full::new(bytes).map_err(|never| match never {}).boxed_unsync())
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use courier_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Rotation { name: String }
///
/// let rotation = Rotation { name: "weekly".to_string() };
/// let bytes = to_json(&rotation).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"weekly"}"#);
/// ```
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` to provide detailed error messages that include
/// the exact path to the field that failed to deserialize.
///
/// # Errors
///
/// Returns an error if JSON deserialization fails, with the error message
/// including the path to the problematic field (e.g., "rotation.participants").
///
/// # Example
///
/// ```
/// use courier_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct Team { name: String }
///
/// let team: Team = from_json(br#"{"name":"sre"}"#).expect("deserialize");
/// assert_eq!(team, Team { name: "sre".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_as_str() {
        assert_eq!(ContentType::Json.as_str(), "application/json");
        assert_eq!(ContentType::Json.to_string(), "application/json");
    }

    #[tokio::test]
    async fn body_collects_bytes() {
        let body = Body::from(r#"{"id":"42"}"#);
        let bytes = body.collect().await.expect("collect");
        assert_eq!(bytes.as_ref(), br#"{"id":"42"}"#);
    }

    #[tokio::test]
    async fn empty_body_collects_nothing() {
        let bytes = Body::empty().collect().await.expect("collect");
        assert!(bytes.is_empty());
    }

    #[test]
    fn to_json_serialize() {
        #[derive(serde::Serialize)]
        struct Member {
            name: String,
            order: u32,
        }

        let member = Member {
            name: "Alice".to_string(),
            order: 1,
        };

        let bytes = to_json(&member).expect("serialize");
        assert_eq!(bytes.as_ref(), br#"{"name":"Alice","order":1}"#);
    }

    #[test]
    fn from_json_syntax_error() {
        #[derive(Debug, serde::Deserialize)]
        struct Team {
            #[allow(dead_code)]
            name: String,
        }

        let result: Result<Team> = from_json(b"not json");
        let err = result.expect_err("should fail");
        assert!(err.to_string().contains("JSON deserialization error"));
    }

    #[test]
    fn from_json_missing_field_error_with_path() {
        #[derive(Debug, serde::Deserialize)]
        struct Participant {
            #[allow(dead_code)]
            id: String,
        }

        #[derive(Debug, serde::Deserialize)]
        struct Rotation {
            #[allow(dead_code)]
            participant: Participant,
        }

        let result: Result<Rotation> = from_json(br#"{"participant":{}}"#);
        let msg = result.expect_err("should fail").to_string();
        assert!(
            msg.contains("participant"),
            "Expected path 'participant' in error: {msg}"
        );
        assert!(msg.contains("id"), "Expected field 'id' mentioned in error: {msg}");
    }
}

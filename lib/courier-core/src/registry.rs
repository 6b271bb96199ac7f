//! Status-code keyed decoding of error payloads.
//!
//! Every backend family answers failures with its own JSON envelope, and the
//! shapes have nothing in common. An [`ErrorRegistry`] maps each status code a
//! family documents to the envelope type that decodes it. The transport and
//! response layers only see `dyn ErrorEnvelope`.
//!
//! # Example
//!
//! ```
//! use courier_core::{ErrorEnvelope, ErrorRegistry};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct Problem {
//!     detail: String,
//! }
//!
//! impl std::fmt::Display for Problem {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "Detail: {}", self.detail)
//!     }
//! }
//!
//! impl ErrorEnvelope for Problem {}
//!
//! let registry = ErrorRegistry::new().register::<Problem>([400, 404]);
//! let decoded = registry
//!     .decode(404, br#"{"detail":"no such team"}"#)
//!     .expect("404 is registered")
//!     .expect("valid envelope");
//! assert_eq!(decoded.to_string(), "Detail: no such team");
//! assert!(decoded.downcast_ref::<Problem>().is_some());
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::{Result, from_json};

/// Upcast helper so `dyn ErrorEnvelope` can be downcast to its concrete type.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A decoded error payload.
///
/// The [`Display`](fmt::Display) implementation renders the human-readable
/// message shown to users. Implementors should tolerate absent fields, which
/// `#[serde(default)]` takes care of.
pub trait ErrorEnvelope: fmt::Display + fmt::Debug + AsAny + Send + Sync {
    /// The rendered message.
    fn message(&self) -> String {
        self.to_string()
    }
}

impl dyn ErrorEnvelope {
    /// Returns the concrete envelope if it is of type `E`.
    #[must_use]
    pub fn downcast_ref<E: ErrorEnvelope>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

type DecodeFn = fn(&[u8]) -> Result<Box<dyn ErrorEnvelope>>;

#[derive(Clone, Copy)]
struct Decoder {
    envelope: &'static str,
    decode: DecodeFn,
}

fn decode_as<E>(bytes: &[u8]) -> Result<Box<dyn ErrorEnvelope>>
where
    E: ErrorEnvelope + DeserializeOwned,
{
    let envelope: E = from_json(bytes)?;
    Ok(Box::new(envelope))
}

/// Maps HTTP status codes to the envelope type that decodes them.
///
/// Registries are built once per backend family and then only read.
#[derive(Clone, Default)]
pub struct ErrorRegistry {
    decoders: BTreeMap<u16, Decoder>,
}

impl ErrorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the given status codes with envelope type `E`.
    ///
    /// Codes already registered are remapped to `E`.
    #[must_use]
    pub fn register<E>(mut self, codes: impl IntoIterator<Item = u16>) -> Self
    where
        E: ErrorEnvelope + DeserializeOwned,
    {
        let decoder = Decoder {
            envelope: std::any::type_name::<E>(),
            decode: decode_as::<E>,
        };
        for code in codes {
            self.decoders.insert(code, decoder);
        }
        self
    }

    /// Returns `true` if a decoder is registered for `status`.
    #[must_use]
    pub fn contains(&self, status: u16) -> bool {
        self.decoders.contains_key(&status)
    }

    /// Registered status codes, in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.decoders.keys().copied()
    }

    /// Type name of the envelope registered for `status`.
    #[must_use]
    pub fn envelope_name(&self, status: u16) -> Option<&'static str> {
        self.decoders.get(&status).map(|decoder| decoder.envelope)
    }

    /// Decode `body` with the envelope registered for `status`.
    ///
    /// Returns `None` when no decoder is registered for `status`.
    #[must_use]
    pub fn decode(&self, status: u16, body: &[u8]) -> Option<Result<Box<dyn ErrorEnvelope>>> {
        self.decoders
            .get(&status)
            .map(|decoder| (decoder.decode)(body))
    }

    /// Number of registered status codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if no status code is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl fmt::Debug for ErrorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.decoders.iter().map(|(code, d)| (code, d.envelope)))
            .finish()
    }
}

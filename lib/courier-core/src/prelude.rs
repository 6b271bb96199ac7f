//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier_core::prelude::*;
//! ```

pub use crate::{
    Body, ContentType, Error, ErrorEnvelope, ErrorRegistry, Method, OutboundRequest, Response,
    Result, Transport, from_json, to_json,
};

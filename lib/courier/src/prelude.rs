//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier::prelude::*;
//! ```

pub use crate::middleware::{ConstantBackoff, ExponentialBackoff};
pub use crate::{
    Client, ClientConfig, ContentType, Error, ErrorEnvelope, ErrorRegistry, Method,
    OutboundRequest, Request, Response, Result, StatusCode, from_json, header, to_json,
};
pub use serde::{Deserialize, Serialize};

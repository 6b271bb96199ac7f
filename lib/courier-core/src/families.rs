//! Error envelopes of the known backend families.
//!
//! | Family | Registry | Envelope(s) |
//! |--------|----------|-------------|
//! | Operations | [`ErrorRegistry::ops`] | [`OpsErrorList`], [`OpsUnauthorized`] (401) |
//! | Teams | [`ErrorRegistry::team`] | [`TeamError`] |
//! | Teams, ops enablement endpoints | [`ErrorRegistry::team_enable_ops`] | [`TeamEnableOpsError`] |
//! | Users | [`ErrorRegistry::user`] | [`UserError`] |
//!
//! Fields absent from a payload, or sent as `null`, decode to their default.

use std::fmt;

use serde::{Deserialize, Deserializer};

use crate::{ErrorEnvelope, ErrorRegistry};

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One entry of an operations error list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OpsErrorItem {
    /// Short description of the failure.
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    /// Numeric error code.
    #[serde(deserialize_with = "nullable")]
    pub code: i32,
}

/// Operations API error payload: `{"errors":[{"title":..,"code":..}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OpsErrorList {
    /// Reported errors.
    #[serde(deserialize_with = "nullable")]
    pub errors: Vec<OpsErrorItem>,
}

impl fmt::Display for OpsErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "Error: {}, Code: {}", error.title, error.code)?;
        }
        Ok(())
    }
}

impl ErrorEnvelope for OpsErrorList {}

/// Operations API payload for rejected credentials: `{"code":..,"message":..}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OpsUnauthorized {
    /// Numeric error code.
    #[serde(deserialize_with = "nullable")]
    pub code: i32,
    /// Error message.
    #[serde(deserialize_with = "nullable")]
    pub message: String,
}

impl fmt::Display for OpsUnauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code: {}, Message: {}", self.code, self.message)
    }
}

impl ErrorEnvelope for OpsUnauthorized {}

/// Teams API error payload: `{"code":"..","message":..}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TeamError {
    /// Symbolic error code, e.g. `NOT_FOUND`.
    #[serde(deserialize_with = "nullable")]
    pub code: String,
    /// Error message.
    #[serde(deserialize_with = "nullable")]
    pub message: String,
}

impl fmt::Display for TeamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code: {}, Message: {}", self.code, self.message)
    }
}

impl ErrorEnvelope for TeamError {}

/// Error payload of the team ops-enablement endpoints: `{"message":..}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TeamEnableOpsError {
    /// Error message.
    #[serde(deserialize_with = "nullable")]
    pub message: String,
}

impl fmt::Display for TeamEnableOpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message: {}", self.message)
    }
}

impl ErrorEnvelope for TeamEnableOpsError {}

/// Users API error payload: `{"errorMessages":[..],"errors":..,"status":..}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserError {
    /// Free-form messages.
    #[serde(deserialize_with = "nullable")]
    pub error_messages: Vec<String>,
    /// Field errors, in whatever shape the service chose.
    pub errors: serde_json::Value,
    /// HTTP status echoed by the service.
    #[serde(deserialize_with = "nullable")]
    pub status: i32,
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for message in &self.error_messages {
            writeln!(f, "Error: {message}")?;
        }
        if !self.errors.is_null() {
            writeln!(f, "Errors: {}", self.errors)?;
        }
        Ok(())
    }
}

impl ErrorEnvelope for UserError {}

impl ErrorRegistry {
    /// Registry of the operations API.
    #[must_use]
    pub fn ops() -> Self {
        Self::new()
            .register::<OpsErrorList>([400, 402, 403, 404, 409, 422, 429])
            .register::<OpsUnauthorized>([401])
    }

    /// Registry of the teams API.
    #[must_use]
    pub fn team() -> Self {
        Self::new().register::<TeamError>([400, 403, 404, 410, 413, 415, 422])
    }

    /// Registry of the team ops-enablement endpoints.
    #[must_use]
    pub fn team_enable_ops() -> Self {
        Self::new().register::<TeamEnableOpsError>([400, 403, 404, 410, 413, 415, 422])
    }

    /// Registry of the users API.
    #[must_use]
    pub fn user() -> Self {
        Self::new().register::<UserError>([400, 401, 429])
    }
}

//! Error types for the provider client and the status repository.
//!
//! # Design
//! Provider calls never surface as `Err` to helper callers. `HttpError` and
//! `ProviderError` are carried inside `ApiOutcome` as data and serialized
//! into log contexts, which is why both derive `Serialize`. Only
//! configuration loading and the status repository use `Result` in the
//! conventional way.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A transport-level failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HttpError {
    /// The provider answered with a status outside 2xx.
    #[error("provider responded with HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    /// The request never produced a response (DNS, connect, TLS, timeout,
    /// or a body that could not be read).
    #[error("request could not be completed: {message}")]
    Transport { message: String },

    /// The response arrived but its body is not JSON.
    #[error("response body is not valid JSON: {message}")]
    Decode { message: String },

    /// The request payload could not be encoded.
    #[error("request body could not be encoded: {message}")]
    Encode { message: String },
}

impl HttpError {
    /// HTTP status of the failed call, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A business-level error reported by the provider in a response body.
///
/// Mirrors the provider's error object; only `error` is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ProviderError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            code: None,
            error: error.into(),
            message: None,
            request_id: None,
        }
    }
}

/// Errors raised while loading `ClientConfig`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("base URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),
}

/// Errors raised by a `StatusRepository`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("status with id \"{status_id}\" does not exist")]
    NotFound { status_id: String },

    #[error("could not load statuses: {0}")]
    CouldNotLoad(String),

    #[error("could not save the status: {0}")]
    CouldNotSave(String),

    #[error("could not delete the status: {0}")]
    CouldNotDelete(String),
}

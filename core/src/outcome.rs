//! The classified result of one provider call.
//!
//! # Design
//! Each `ApiClient` verb returns an `ApiOutcome` for exactly the call that
//! produced it. There is no "last call" state on the client, so an outcome
//! cannot describe a different call and cannot be read before a call exists.

use serde_json::Value;

use crate::error::{HttpError, ProviderError};

#[must_use = "a provider call outcome must be inspected"]
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// 2xx with a decoded body that carries no provider error.
    Success(Value),

    /// No usable response, or a non-2xx status. `errors` and `body` hold
    /// whatever the provider put in the error body, when it was JSON.
    TransportFailure {
        error: HttpError,
        errors: Vec<ProviderError>,
        body: Option<Value>,
    },

    /// 2xx whose body declares one or more provider errors.
    ProviderFailure { errors: Vec<ProviderError>, body: Value },
}

impl ApiOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success(_))
    }

    pub fn http_error(&self) -> Option<&HttpError> {
        match self {
            ApiOutcome::TransportFailure { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Provider errors in the order the body listed them; empty on success.
    pub fn errors(&self) -> &[ProviderError] {
        match self {
            ApiOutcome::Success(_) => &[],
            ApiOutcome::TransportFailure { errors, .. } | ApiOutcome::ProviderFailure { errors, .. } => errors,
        }
    }

    /// The decoded response body, if the call produced one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiOutcome::Success(body) | ApiOutcome::ProviderFailure { body, .. } => Some(body),
            ApiOutcome::TransportFailure { body, .. } => body.as_ref(),
        }
    }

    pub fn into_body(self) -> Option<Value> {
        match self {
            ApiOutcome::Success(body) | ApiOutcome::ProviderFailure { body, .. } => Some(body),
            ApiOutcome::TransportFailure { body, .. } => body,
        }
    }

    /// The body on success, `None` on any failure.
    pub fn into_success(self) -> Option<Value> {
        match self {
            ApiOutcome::Success(body) => Some(body),
            _ => None,
        }
    }
}

/// Collect the provider errors declared by a decoded body.
///
/// A body declares errors either through a non-empty `errors` array or a
/// top-level `error` string. The provider's own error objects and failed
/// charge objects both use the latter. Every entry of a non-empty `errors`
/// array yields one `ProviderError`, whatever its shape.
pub fn provider_errors(body: &Value) -> Vec<ProviderError> {
    if let Some(list) = body.get("errors").and_then(Value::as_array) {
        if !list.is_empty() {
            return list.iter().map(error_entry).collect();
        }
    }
    match body.get("error") {
        Some(Value::String(error)) if !error.is_empty() => {
            let mut entry = serde_json::from_value::<ProviderError>(body.clone())
                .unwrap_or_else(|_| ProviderError::new(error.clone()));
            if entry.message.is_none() {
                entry.message = body
                    .get("error_state")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            vec![entry]
        }
        _ => Vec::new(),
    }
}

fn error_entry(item: &Value) -> ProviderError {
    match item {
        Value::String(error) => ProviderError::new(error.clone()),
        Value::Object(fields) => serde_json::from_value(item.clone()).unwrap_or_else(|_| {
            let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
            // validation entries often carry only a message
            let mut entry = ProviderError::new(
                text("error")
                    .or_else(|| text("message"))
                    .unwrap_or_else(|| item.to_string()),
            );
            entry.code = fields.get("code").and_then(Value::as_i64);
            entry.message = text("message");
            entry.request_id = text("request_id");
            entry
        }),
        other => ProviderError::new(other.to_string()),
    }
}

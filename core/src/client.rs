//! Authenticated request builder, dispatcher and response classifier for the
//! provider API.
//!
//! # Design
//! `ApiClient` holds the base URL and an owned `Transport`, nothing else.
//! Every verb is `build_request` → `Transport::execute` → `parse_response`;
//! the first and last steps are pure so they can be checked against canned
//! data. The api key travels with each call and is never stored.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::HttpError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::outcome::{provider_errors, ApiOutcome};
use crate::transport::{Transport, UreqTransport};

/// A JSON object sent as a request body.
pub type Payload = Map<String, Value>;

/// Synchronous client for the provider API.
///
/// One call is in flight at a time per caller; every call returns its own
/// `ApiOutcome`, so a client can be reused sequentially without one call's
/// result leaking into the next.
#[derive(Debug)]
pub struct ApiClient<T = UreqTransport> {
    base_url: String,
    transport: T,
}

impl ApiClient<UreqTransport> {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_transport(&config.base_url, UreqTransport::new(config.timeout()))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get(&self, api_key: &str, path: &str) -> ApiOutcome {
        self.send(HttpMethod::Get, api_key, path, None)
    }

    pub fn post(&self, api_key: &str, path: &str, body: &Payload) -> ApiOutcome {
        self.send(HttpMethod::Post, api_key, path, Some(body))
    }

    pub fn delete(&self, api_key: &str, path: &str) -> ApiOutcome {
        self.send(HttpMethod::Delete, api_key, path, None)
    }

    fn send(&self, method: HttpMethod, api_key: &str, path: &str, body: Option<&Payload>) -> ApiOutcome {
        let request = match self.build_request(method, api_key, path, body) {
            Ok(request) => request,
            Err(error) => {
                return ApiOutcome::TransportFailure {
                    error,
                    errors: Vec::new(),
                    body: None,
                }
            }
        };

        tracing::debug!(method = method.as_str(), url = %request.url, "sending provider request");
        match self.transport.execute(&request) {
            Ok(response) => {
                tracing::debug!(
                    method = method.as_str(),
                    url = %request.url,
                    status = response.status,
                    "provider responded"
                );
                self.parse_response(response)
            }
            Err(error) => {
                tracing::debug!(method = method.as_str(), url = %request.url, %error, "provider request failed");
                ApiOutcome::TransportFailure {
                    error,
                    errors: Vec::new(),
                    body: None,
                }
            }
        }
    }

    /// Build the request for `path` (relative to the base URL), authenticated
    /// with `api_key` as the Basic-auth user and an empty password.
    pub fn build_request(
        &self,
        method: HttpMethod,
        api_key: &str,
        path: &str,
        body: Option<&Payload>,
    ) -> Result<HttpRequest, HttpError> {
        let mut headers = vec![
            ("authorization".to_string(), basic_auth(api_key)),
            ("accept".to_string(), "application/json".to_string()),
        ];
        let body = match body {
            Some(payload) => {
                let encoded =
                    serde_json::to_string(payload).map_err(|e| HttpError::Encode { message: e.to_string() })?;
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(encoded)
            }
            None => None,
        };
        Ok(HttpRequest {
            method,
            url: format!("{}/{}", self.base_url, path.trim_start_matches('/')),
            headers,
            body,
        })
    }

    /// Classify a response: non-2xx is a transport failure, a 2xx body that
    /// declares errors is a provider failure, anything else is success.
    pub fn parse_response(&self, response: HttpResponse) -> ApiOutcome {
        let decoded = decode_body(&response.body);

        if !response.is_success() {
            let body = decoded.ok();
            let errors = body.as_ref().map(provider_errors).unwrap_or_default();
            return ApiOutcome::TransportFailure {
                error: HttpError::Status {
                    status: response.status,
                    reason: reason_phrase(response.status),
                },
                errors,
                body,
            };
        }

        match decoded {
            Ok(body) => {
                let errors = provider_errors(&body);
                if errors.is_empty() {
                    ApiOutcome::Success(body)
                } else {
                    ApiOutcome::ProviderFailure { errors, body }
                }
            }
            Err(error) => ApiOutcome::TransportFailure {
                error,
                errors: Vec::new(),
                body: None,
            },
        }
    }
}

/// Path of one resource under `endpoint`. The identifier is opaque, so it is
/// percent-encoded into a single segment.
pub fn resource_path(endpoint: &str, id: &str) -> String {
    format!("{endpoint}/{}", urlencoding::encode(id))
}

fn basic_auth(api_key: &str) -> String {
    format!("Basic {}", BASE64_STANDARD.encode(format!("{api_key}:")))
}

fn decode_body(body: &str) -> Result<Value, HttpError> {
    if body.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(body).map_err(|e| HttpError::Decode { message: e.to_string() })
}

fn reason_phrase(status: u16) -> String {
    ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

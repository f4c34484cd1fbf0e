//! Executes `HttpRequest` values against the network.
//!
//! `Transport` is the only I/O seam in the crate. `UreqTransport` is the
//! blocking production implementation; tests substitute canned transports.

use std::time::Duration;

use crate::error::HttpError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Performs one HTTP exchange.
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status; `Err` is reserved for exchanges that produced no response.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// `timeout` bounds the whole exchange, connect through body read.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let result = match (request.method, &request.body) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(&request.url), &request.headers).call(),
            (HttpMethod::Delete, _) => {
                with_headers(self.agent.delete(&request.url), &request.headers).call()
            }
            (HttpMethod::Post, Some(body)) => {
                with_headers(self.agent.post(&request.url), &request.headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => {
                with_headers(self.agent.post(&request.url), &request.headers).send_empty()
            }
        };
        let mut response = result.map_err(|e| HttpError::Transport { message: e.to_string() })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| HttpError::Transport { message: e.to_string() })?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

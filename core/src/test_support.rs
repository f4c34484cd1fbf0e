use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::HttpError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Replays queued responses in order and records every request it sees.
#[derive(Debug, Default)]
pub struct StubTransport {
    queued: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn push_json(&self, status: u16, body: Value) {
        self.queued.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        }));
    }

    pub fn push_error(&self, error: HttpError) {
        self.queued.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Option<Value> {
        let sent = self.sent.lock().unwrap();
        let body = sent.last()?.body.as_deref()?;
        serde_json::from_str(body).ok()
    }
}

impl Transport for StubTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        self.sent.lock().unwrap().push(request.clone());
        self.queued.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(HttpError::Transport {
                message: "no canned response queued".to_string(),
            })
        })
    }
}

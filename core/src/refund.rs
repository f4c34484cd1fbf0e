//! Refund operations on top of `ApiClient`.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::client::{resource_path, ApiClient, Payload};
use crate::config::ClientConfig;
use crate::logger::{log_outcome, EventLogger};
use crate::outcome::ApiOutcome;
use crate::transport::{Transport, UreqTransport};

pub const REFUND_ENDPOINT: &str = "refund";

/// Refund helper. Owns its client, like `Charge`.
pub struct Refund<T = UreqTransport> {
    client: ApiClient<T>,
    logger: Arc<dyn EventLogger>,
}

impl Refund<UreqTransport> {
    pub fn new(config: &ClientConfig, logger: Arc<dyn EventLogger>) -> Self {
        Self::with_client(ApiClient::from_config(config), logger)
    }
}

impl<T: Transport> Refund<T> {
    pub fn with_client(client: ApiClient<T>, logger: Arc<dyn EventLogger>) -> Self {
        Self { client, logger }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// Fetch a refund by id. `None` on any failure.
    pub fn get(&self, api_key: &str, handle: &str) -> Option<Value> {
        let outcome = self.client.get(api_key, &resource_path(REFUND_ENDPOINT, handle));
        log_outcome(self.logger.as_ref(), "Refund::get", json!({"handle": handle}), &outcome);
        outcome.into_success()
    }

    /// Create a refund. The outcome is returned as-is on failure too, since
    /// a declined refund still carries the provider's refund object.
    pub fn create(&self, api_key: &str, refund: &Payload) -> ApiOutcome {
        let outcome = self.client.post(api_key, REFUND_ENDPOINT, refund);
        log_outcome(self.logger.as_ref(), "Refund::create", json!({"refund": refund}), &outcome);
        outcome
    }
}

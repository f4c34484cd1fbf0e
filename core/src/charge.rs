//! Charge operations on top of `ApiClient`.
//!
//! Each operation makes exactly one provider call and reports it exactly
//! once through the `EventLogger`. Failures never surface as `Err`:
//! `settle` hands back the full `ApiOutcome` (the provider may answer a
//! settle with a failed charge that callers need to read), all other
//! operations return `None` on failure.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::client::{resource_path, ApiClient, Payload};
use crate::config::ClientConfig;
use crate::logger::{log_outcome, EventLogger};
use crate::outcome::ApiOutcome;
use crate::transport::{Transport, UreqTransport};

pub const CHARGE_ENDPOINT: &str = "charge";

/// Charge helper. Owns its client; share across threads by giving each
/// worker its own `Charge`.
pub struct Charge<T = UreqTransport> {
    client: ApiClient<T>,
    logger: Arc<dyn EventLogger>,
}

impl Charge<UreqTransport> {
    pub fn new(config: &ClientConfig, logger: Arc<dyn EventLogger>) -> Self {
        Self::with_client(ApiClient::from_config(config), logger)
    }
}

impl<T: Transport> Charge<T> {
    pub fn with_client(client: ApiClient<T>, logger: Arc<dyn EventLogger>) -> Self {
        Self { client, logger }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// Fetch a charge by handle (or invoice id).
    pub fn get(&self, api_key: &str, handle: &str) -> Option<Value> {
        let outcome = self.client.get(api_key, &resource_path(CHARGE_ENDPOINT, handle));
        log_outcome(self.logger.as_ref(), "Charge::get", json!({"handle": handle}), &outcome);
        outcome.into_success()
    }

    pub fn create(&self, api_key: &str, charge: &Payload) -> Option<Value> {
        self.create_logged(api_key, "Charge::create", json!({"charge": charge}), charge)
    }

    /// Create a charge together with a new customer described by `customer`.
    pub fn create_with_new_customer(
        &self,
        api_key: &str,
        handle: &str,
        source: &str,
        customer: Payload,
        option: Payload,
    ) -> Option<Value> {
        let payload = new_customer_payload(handle, source, customer, option);
        self.create_logged(
            api_key,
            "Charge::create_with_new_customer",
            json!({"option": &payload}),
            &payload,
        )
    }

    /// Create a charge for the customer already registered as
    /// `customer_handle`.
    pub fn create_with_exist_customer(
        &self,
        api_key: &str,
        handle: &str,
        source: &str,
        customer_handle: &str,
        option: Payload,
    ) -> Option<Value> {
        let payload = exist_customer_payload(handle, source, customer_handle, option);
        self.create_logged(
            api_key,
            "Charge::create_with_exist_customer",
            json!({"option": &payload}),
            &payload,
        )
    }

    fn create_logged(&self, api_key: &str, origin: &str, param: Value, payload: &Payload) -> Option<Value> {
        let outcome = self.client.post(api_key, CHARGE_ENDPOINT, payload);
        log_outcome(self.logger.as_ref(), origin, param, &outcome);
        outcome.into_success()
    }

    /// Settle an authorized charge, the second step of an authorize/settle
    /// flow. `settle` may adjust amount or order lines; `None` sends
    /// `{"key": ""}`.
    ///
    /// Returns the outcome itself even on failure, so the error-carrying
    /// body stays available to the caller.
    pub fn settle(&self, api_key: &str, handle: &str, settle: Option<Payload>) -> ApiOutcome {
        let settle = settle.unwrap_or_else(default_settle);
        let outcome = self
            .client
            .post(api_key, &format!("{}/settle", resource_path(CHARGE_ENDPOINT, handle)), &settle);
        log_outcome(
            self.logger.as_ref(),
            "Charge::settle",
            json!({"handle": handle, "settle": &settle}),
            &outcome,
        );
        outcome
    }

    pub fn cancel(&self, api_key: &str, handle: &str) -> Option<Value> {
        let outcome = self
            .client
            .post(api_key, &format!("{}/cancel", resource_path(CHARGE_ENDPOINT, handle)), &Payload::new());
        log_outcome(self.logger.as_ref(), "Charge::cancel", json!({"handle": handle}), &outcome);
        outcome.into_success()
    }

    pub fn delete(&self, api_key: &str, handle: &str) -> Option<Value> {
        let outcome = self.client.delete(api_key, &resource_path(CHARGE_ENDPOINT, handle));
        log_outcome(self.logger.as_ref(), "Charge::delete", json!({"handle": handle}), &outcome);
        outcome.into_success()
    }
}

/// `option` with `handle`, `source` and `customer` set on top, replacing any
/// keys of the same name.
pub fn new_customer_payload(handle: &str, source: &str, customer: Payload, mut option: Payload) -> Payload {
    option.insert("handle".to_string(), Value::from(handle));
    option.insert("source".to_string(), Value::from(source));
    option.insert("customer".to_string(), Value::Object(customer));
    option
}

/// `option` with `handle`, `source` and `customer_handle` set on top,
/// replacing any keys of the same name.
pub fn exist_customer_payload(handle: &str, source: &str, customer_handle: &str, mut option: Payload) -> Payload {
    option.insert("handle".to_string(), Value::from(handle));
    option.insert("source".to_string(), Value::from(source));
    option.insert("customer_handle".to_string(), Value::from(customer_handle));
    option
}

fn default_settle() -> Payload {
    let mut settle = Payload::new();
    settle.insert("key".to_string(), Value::from(""));
    settle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::http::HttpMethod;
    use crate::logger::{LogLevel, MemoryLogger};
    use crate::test_support::StubTransport;

    const KEY: &str = "priv_test";

    fn charge() -> (Charge<StubTransport>, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        let client = ApiClient::with_transport("http://stub/v1", StubTransport::default());
        (Charge::with_client(client, logger.clone()), logger)
    }

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn transport(charge: &Charge<StubTransport>) -> &StubTransport {
        charge.client.transport()
    }

    #[test]
    fn new_customer_payload_merges_over_option() {
        let merged = new_customer_payload(
            "h1",
            "src1",
            payload(json!({"email": "a@b.com"})),
            payload(json!({"currency": "USD"})),
        );
        assert_eq!(
            Value::Object(merged),
            json!({"currency": "USD", "handle": "h1", "source": "src1", "customer": {"email": "a@b.com"}})
        );
    }

    #[test]
    fn merged_fields_overwrite_option_keys() {
        let merged = exist_customer_payload("h2", "src2", "cust-42", payload(json!({"handle": "old", "amount": 5})));
        assert_eq!(merged["handle"], "h2");
        assert_eq!(merged["amount"], 5);
    }

    #[test]
    fn create_with_new_customer_posts_merged_payload() {
        let (charge, logger) = charge();
        transport(&charge).push_json(200, json!({"handle": "h1", "state": "authorized"}));

        let result = charge.create_with_new_customer(
            KEY,
            "h1",
            "src1",
            payload(json!({"email": "a@b.com"})),
            payload(json!({"currency": "USD"})),
        );
        assert_eq!(result, Some(json!({"handle": "h1", "state": "authorized"})));

        let sent = transport(&charge).requests();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url, "http://stub/v1/charge");
        assert_eq!(
            transport(&charge).last_body(),
            Some(json!({"currency": "USD", "handle": "h1", "source": "src1", "customer": {"email": "a@b.com"}}))
        );

        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].origin, "Charge::create_with_new_customer");
        assert_eq!(entries[0].context["param"]["option"]["customer"]["email"], "a@b.com");
    }

    #[test]
    fn create_with_exist_customer_posts_customer_handle() {
        let (charge, logger) = charge();
        transport(&charge).push_json(200, json!({"handle": "h2"}));

        let _ = charge.create_with_exist_customer(KEY, "h2", "src2", "cust-42", Payload::new());
        assert_eq!(
            transport(&charge).last_body(),
            Some(json!({"handle": "h2", "source": "src2", "customer_handle": "cust-42"}))
        );
        assert_eq!(logger.entries().len(), 1);
    }

    #[test]
    fn settle_without_body_sends_empty_key() {
        let (charge, _) = charge();
        transport(&charge).push_json(200, json!({"handle": "h3", "state": "settled"}));

        let outcome = charge.settle(KEY, "h3", None);
        assert!(outcome.is_success());
        let sent = transport(&charge).requests();
        assert_eq!(sent[0].url, "http://stub/v1/charge/h3/settle");
        assert_eq!(transport(&charge).last_body(), Some(json!({"key": ""})));
    }

    #[test]
    fn settle_failure_returns_error_body_not_sentinel() {
        let (charge, logger) = charge();
        transport(&charge).push_json(400, json!({"code": 29, "error": "Invalid charge state"}));

        let outcome = charge.settle(KEY, "h3", Some(payload(json!({"amount": 500}))));
        assert!(!outcome.is_success());
        assert_eq!(outcome.body().unwrap()["error"], "Invalid charge state");

        let entry = &logger.entries()[0];
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.context["param"]["settle"]["amount"], 500);
        assert_eq!(entry.context["http_errors"]["status"], 400);
    }

    #[test]
    fn settle_declined_in_success_body_is_reported_as_failure() {
        let (charge, logger) = charge();
        transport(&charge).push_json(200, json!({"handle": "h3", "state": "failed", "error": "settle_declined"}));

        let outcome = charge.settle(KEY, "h3", None);
        assert!(outcome.http_error().is_none());
        assert_eq!(outcome.errors()[0].error, "settle_declined");
        assert_eq!(outcome.body().unwrap()["state"], "failed");
        assert_eq!(logger.entries()[0].level, LogLevel::Error);
    }

    #[test]
    fn get_failure_returns_sentinel_and_logs_error() {
        let (charge, logger) = charge();
        transport(&charge).push_json(404, json!({"code": 12, "error": "Charge not found"}));

        assert_eq!(charge.get(KEY, "missing"), None);
        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Error);
        assert_eq!(entries[0].origin, "Charge::get");
        assert_eq!(entries[0].context["param"]["handle"], "missing");
        assert_eq!(entries[0].context["response_errors"][0]["code"], 12);
    }

    #[test]
    fn cancel_posts_empty_object() {
        let (charge, logger) = charge();
        transport(&charge).push_json(200, json!({"handle": "h4", "state": "cancelled"}));

        let result = charge.cancel(KEY, "h4").unwrap();
        assert_eq!(result["state"], "cancelled");
        let sent = transport(&charge).requests();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url, "http://stub/v1/charge/h4/cancel");
        assert_eq!(sent[0].body.as_deref(), Some("{}"));
        assert_eq!(logger.entries()[0].level, LogLevel::Info);
    }

    #[test]
    fn delete_uses_delete_verb_and_sentinel_on_transport_error() {
        let (charge, logger) = charge();
        transport(&charge).push_error(HttpError::Transport {
            message: "connection reset".to_string(),
        });

        assert_eq!(charge.delete(KEY, "h5"), None);
        let sent = transport(&charge).requests();
        assert_eq!(sent[0].method, HttpMethod::Delete);
        assert_eq!(sent[0].url, "http://stub/v1/charge/h5");
        assert!(sent[0].body.is_none());
        assert_eq!(logger.entries()[0].context["http_errors"]["kind"], "transport");
    }

    #[test]
    fn create_success_logs_response() {
        let (charge, logger) = charge();
        let body = json!({"handle": "h6", "amount": 1000, "currency": "DKK"});
        transport(&charge).push_json(200, body.clone());

        let result = charge.create(KEY, &payload(json!({"handle": "h6", "amount": 1000, "currency": "DKK"})));
        assert_eq!(result, Some(body.clone()));
        let entry = &logger.entries()[0];
        assert_eq!(entry.origin, "Charge::create");
        assert_eq!(entry.context["param"]["charge"]["handle"], "h6");
        assert_eq!(entry.context["response"], body);
    }

    #[test]
    fn handles_with_reserved_characters_stay_in_one_segment() {
        let (charge, _) = charge();
        transport(&charge).push_json(200, json!({"handle": "order#7"}));
        transport(&charge).push_json(200, json!({"handle": "a/b"}));
        transport(&charge).push_json(200, json!({"handle": "a/b", "state": "settled"}));

        charge.delete(KEY, "order#7");
        charge.get(KEY, "a/b");
        let _ = charge.settle(KEY, "a/b", None);
        let urls: Vec<String> = transport(&charge).requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://stub/v1/charge/order%237",
                "http://stub/v1/charge/a%2Fb",
                "http://stub/v1/charge/a%2Fb/settle",
            ]
        );
    }

    #[test]
    fn repeated_get_returns_identical_bodies() {
        let (charge, logger) = charge();
        let body = json!({"handle": "h7", "state": "authorized"});
        transport(&charge).push_json(200, body.clone());
        transport(&charge).push_json(200, body.clone());

        assert_eq!(charge.get(KEY, "h7"), charge.get(KEY, "h7"));
        assert_eq!(logger.entries().len(), 2);
    }
}

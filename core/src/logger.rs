//! The event logger consumed by the resource helpers.
//!
//! Helpers report every provider call through `EventLogger` with an origin
//! such as `Charge::settle` and a JSON context:
//!
//! ```json
//! {"param": {...}, "response": {...}}
//! {"param": {...}, "http_errors": {...}, "response_errors": [...]}
//! ```
//!
//! Where the events end up is the implementor's concern. `TracingLogger`
//! forwards them to `tracing`; `MemoryLogger` keeps them in memory.

use std::sync::{Mutex, PoisonError};

use serde_json::{json, Map, Value};

use crate::outcome::ApiOutcome;

pub type LogContext = Map<String, Value>;

/// Structured event sink. Calls are fire-and-forget.
///
/// `flush` asks the sink to persist the event immediately instead of
/// buffering it.
pub trait EventLogger: Send + Sync {
    fn add_info(&self, origin: &str, context: &LogContext, flush: bool);
    fn add_error(&self, origin: &str, context: &LogContext, flush: bool);
}

/// Emits events as `tracing` records under the `billwerk` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl EventLogger for TracingLogger {
    fn add_info(&self, origin: &str, context: &LogContext, flush: bool) {
        let context = Value::Object(context.clone());
        tracing::info!(target: "billwerk", origin, flush, %context, "provider call succeeded");
    }

    fn add_error(&self, origin: &str, context: &LogContext, flush: bool) {
        let context = Value::Object(context.clone());
        tracing::error!(target: "billwerk", origin, flush, %context, "provider call failed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub origin: String,
    pub context: LogContext,
    pub flush: bool,
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn push(&self, level: LogLevel, origin: &str, context: &LogContext, flush: bool) {
        let entry = LogEntry {
            level,
            origin: origin.to_string(),
            context: context.clone(),
            flush,
        };
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }
}

impl EventLogger for MemoryLogger {
    fn add_info(&self, origin: &str, context: &LogContext, flush: bool) {
        self.push(LogLevel::Info, origin, context, flush);
    }

    fn add_error(&self, origin: &str, context: &LogContext, flush: bool) {
        self.push(LogLevel::Error, origin, context, flush);
    }
}

/// Report one finished call: info with the response on success, error with
/// the HTTP and provider errors otherwise.
pub(crate) fn log_outcome(logger: &dyn EventLogger, origin: &str, param: Value, outcome: &ApiOutcome) {
    let mut log = LogContext::new();
    log.insert("param".to_string(), param);
    match outcome {
        ApiOutcome::Success(response) => {
            log.insert("response".to_string(), response.clone());
            logger.add_info(origin, &log, true);
        }
        _ => {
            log.insert("http_errors".to_string(), json!(outcome.http_error()));
            log.insert("response_errors".to_string(), json!(outcome.errors()));
            logger.add_error(origin, &log, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HttpError, ProviderError};

    #[test]
    fn success_is_logged_as_info_with_response() {
        let logger = MemoryLogger::new();
        let outcome = ApiOutcome::Success(json!({"handle": "h1"}));
        log_outcome(&logger, "Charge::get", json!({"handle": "h1"}), &outcome);

        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].origin, "Charge::get");
        assert!(entries[0].flush);
        assert_eq!(entries[0].context["param"], json!({"handle": "h1"}));
        assert_eq!(entries[0].context["response"], json!({"handle": "h1"}));
        assert!(entries[0].context.get("http_errors").is_none());
    }

    #[test]
    fn failure_is_logged_as_error_with_both_error_kinds() {
        let logger = MemoryLogger::new();
        let outcome = ApiOutcome::TransportFailure {
            error: HttpError::Status {
                status: 404,
                reason: "Not Found".to_string(),
            },
            errors: vec![ProviderError::new("Charge not found")],
            body: None,
        };
        log_outcome(&logger, "Charge::get", json!({"handle": "nope"}), &outcome);

        let entry = &logger.entries()[0];
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.context["param"]["handle"], "nope");
        assert_eq!(entry.context["http_errors"]["status"], 404);
        assert_eq!(entry.context["response_errors"][0]["error"], "Charge not found");
        assert!(entry.context.get("response").is_none());
    }

    #[test]
    fn provider_failure_logs_null_http_error() {
        let logger = MemoryLogger::new();
        let outcome = ApiOutcome::ProviderFailure {
            errors: vec![ProviderError::new("declined_by_acquirer")],
            body: json!({"error": "declined_by_acquirer"}),
        };
        log_outcome(&logger, "Refund::create", json!({}), &outcome);
        let entry = &logger.entries()[0];
        assert_eq!(entry.context["http_errors"], Value::Null);
        assert_eq!(entry.context["response_errors"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn clear_drops_recorded_entries() {
        let logger = MemoryLogger::new();
        logger.add_info("origin", &LogContext::new(), false);
        logger.clear();
        assert!(logger.entries().is_empty());
    }

    #[test]
    fn tracing_logger_accepts_events_without_subscriber() {
        let logger = TracingLogger;
        logger.add_info("Charge::get", &LogContext::new(), true);
        logger.add_error("Charge::get", &LogContext::new(), true);
    }
}

//! Synchronous client core for the Billwerk+ subscription/payment API.
//!
//! # Overview
//! `ApiClient` performs one authenticated call per invocation and classifies
//! the result as an `ApiOutcome`. The `Charge` and `Refund` helpers shape
//! endpoint paths and payloads on top of it and report every call through an
//! `EventLogger`. `StatusRepository` tracks local synchronization state.
//!
//! # Design
//! - Requests and responses are plain data (`http`); the network round-trip
//!   sits behind the `Transport` trait, with `UreqTransport` as the blocking
//!   implementation.
//! - Outcomes are returned per call rather than stored on the client, so a
//!   client never reports on a call other than the one that just finished.
//! - Each helper owns its client. Concurrent callers use separate helpers.

pub mod charge;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod outcome;
pub mod refund;
pub mod status;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use charge::{Charge, CHARGE_ENDPOINT};
pub use client::{resource_path, ApiClient, Payload};
pub use config::ClientConfig;
pub use error::{ConfigError, HttpError, ProviderError, StatusError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use logger::{EventLogger, LogContext, LogEntry, LogLevel, MemoryLogger, TracingLogger};
pub use outcome::ApiOutcome;
pub use refund::{Refund, REFUND_ENDPOINT};
pub use status::{InMemoryStatusRepository, Status, StatusCriteria, StatusField, StatusRepository, StatusSearchResults};
pub use transport::{Transport, UreqTransport};

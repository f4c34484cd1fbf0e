//! In-memory stub of the provider's charge and refund API.
//!
//! Routes live under `/v1` and require Basic auth whose user name starts
//! with `priv_`. Charges echo their create payload back with a `state`;
//! a few magic `source` values trigger declines so clients can be tested
//! against errors reported inside successful responses:
//!
//! - `ca_declined`: create answers 200 with a failed charge.
//! - `ca_settle_declined`: settle answers 200 with a failed charge.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DECLINED_SOURCE: &str = "ca_declined";
pub const SETTLE_DECLINED_SOURCE: &str = "ca_settle_declined";

#[derive(Debug, Default)]
pub struct Provider {
    pub charges: HashMap<String, Value>,
    pub refunds: HashMap<String, Value>,
}

pub type Db = Arc<RwLock<Provider>>;

/// Error body in the provider's format.
#[derive(Debug)]
pub struct ProviderFault {
    status: StatusCode,
    code: u32,
    error: &'static str,
    message: String,
}

impl ProviderFault {
    fn new(status: StatusCode, code: u32, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            error,
            message: message.into(),
        }
    }

    fn charge_not_found(handle: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, 12, "Charge not found", format!("no charge with handle {handle}"))
    }

    fn invalid_state(handle: &str, state: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            29,
            "Invalid charge state",
            format!("charge {handle} is {state}"),
        )
    }
}

impl IntoResponse for ProviderFault {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.code,
            "error": self.error,
            "message": self.message,
            "http_status": self.status.as_u16(),
            "http_reason": self.status.canonical_reason().unwrap_or_default(),
            "request_id": Uuid::new_v4().simple().to_string(),
        });
        (self.status, Json(body)).into_response()
    }
}

type ProviderResult = Result<Json<Value>, ProviderFault>;

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    let api = Router::new()
        .route("/charge", post(create_charge))
        .route("/charge/{handle}", get(get_charge).delete(delete_charge))
        .route("/charge/{handle}/settle", post(settle_charge))
        .route("/charge/{handle}/cancel", post(cancel_charge))
        .route("/refund", post(create_refund))
        .route("/refund/{id}", get(get_refund))
        .route_layer(middleware::from_fn(require_private_key))
        .with_state(db);
    Router::new().nest("/v1", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_private_key(request: Request, next: Next) -> Result<Response, ProviderFault> {
    let key = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(basic_user);
    match key {
        Some(user) if user.starts_with("priv_") => Ok(next.run(request).await),
        _ => Err(ProviderFault::new(
            StatusCode::UNAUTHORIZED,
            5,
            "Unauthorized",
            "a private api key is required",
        )),
    }
}

/// User name of a `Basic` authorization header value.
fn basic_user(value: &str) -> Option<String> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (user, _password) = credentials.split_once(':')?;
    Some(user.to_string())
}

fn required_str<'a>(payload: &'a Map<String, Value>, field: &str) -> Result<&'a str, ProviderFault> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ProviderFault::new(
                StatusCode::BAD_REQUEST,
                1,
                "Missing parameter",
                format!("{field} is required"),
            )
        })
}

fn state_of(charge: &Value) -> &str {
    charge.get("state").and_then(Value::as_str).unwrap_or_default()
}

fn amount_of(value: &Value) -> u64 {
    value.get("amount").and_then(Value::as_u64).unwrap_or(0)
}

async fn create_charge(State(db): State<Db>, Json(payload): Json<Map<String, Value>>) -> ProviderResult {
    let handle = required_str(&payload, "handle")?.to_string();
    let mut provider = db.write().await;
    if provider.charges.contains_key(&handle) {
        return Err(ProviderFault::new(
            StatusCode::BAD_REQUEST,
            41,
            "Duplicate handle",
            format!("charge {handle} already exists"),
        ));
    }

    let mut charge = payload.clone();
    let source = payload.get("source").and_then(Value::as_str).unwrap_or_default();
    if source == DECLINED_SOURCE {
        charge.insert("state".to_string(), json!("failed"));
        charge.insert("error".to_string(), json!("declined_by_acquirer"));
        charge.insert("error_state".to_string(), json!("hard_declined"));
    } else if payload.get("settle").and_then(Value::as_bool) == Some(true) {
        charge.insert("state".to_string(), json!("settled"));
    } else {
        charge.insert("state".to_string(), json!("authorized"));
    }
    charge.insert("refunded_amount".to_string(), json!(0));

    let charge = Value::Object(charge);
    provider.charges.insert(handle, charge.clone());
    Ok(Json(charge))
}

async fn get_charge(State(db): State<Db>, Path(handle): Path<String>) -> ProviderResult {
    let provider = db.read().await;
    provider
        .charges
        .get(&handle)
        .cloned()
        .map(Json)
        .ok_or_else(|| ProviderFault::charge_not_found(&handle))
}

async fn settle_charge(
    State(db): State<Db>,
    Path(handle): Path<String>,
    Json(settle): Json<Map<String, Value>>,
) -> ProviderResult {
    let mut provider = db.write().await;
    let charge = provider
        .charges
        .get_mut(&handle)
        .ok_or_else(|| ProviderFault::charge_not_found(&handle))?;
    if state_of(charge) != "authorized" {
        return Err(ProviderFault::invalid_state(&handle, state_of(charge)));
    }

    let authorized = amount_of(charge);
    if let Some(amount) = settle.get("amount").and_then(Value::as_u64) {
        if amount > authorized {
            return Err(ProviderFault::new(
                StatusCode::BAD_REQUEST,
                47,
                "Amount too high",
                format!("settle amount {amount} exceeds authorized {authorized}"),
            ));
        }
        charge["amount"] = json!(amount);
    }

    if charge.get("source").and_then(Value::as_str) == Some(SETTLE_DECLINED_SOURCE) {
        charge["state"] = json!("failed");
        charge["error"] = json!("settle_declined");
        charge["error_state"] = json!("processing_error");
    } else {
        charge["state"] = json!("settled");
    }
    Ok(Json(charge.clone()))
}

async fn cancel_charge(State(db): State<Db>, Path(handle): Path<String>) -> ProviderResult {
    let mut provider = db.write().await;
    let charge = provider
        .charges
        .get_mut(&handle)
        .ok_or_else(|| ProviderFault::charge_not_found(&handle))?;
    if state_of(charge) != "authorized" {
        return Err(ProviderFault::invalid_state(&handle, state_of(charge)));
    }
    charge["state"] = json!("cancelled");
    Ok(Json(charge.clone()))
}

async fn delete_charge(State(db): State<Db>, Path(handle): Path<String>) -> ProviderResult {
    let mut provider = db.write().await;
    let state = match provider.charges.get(&handle) {
        Some(charge) => state_of(charge).to_string(),
        None => return Err(ProviderFault::charge_not_found(&handle)),
    };
    if state == "settled" {
        return Err(ProviderFault::invalid_state(&handle, &state));
    }
    let mut charge = provider
        .charges
        .remove(&handle)
        .ok_or_else(|| ProviderFault::charge_not_found(&handle))?;
    charge["state"] = json!("deleted");
    Ok(Json(charge))
}

async fn create_refund(State(db): State<Db>, Json(payload): Json<Map<String, Value>>) -> ProviderResult {
    let invoice = required_str(&payload, "invoice")?.to_string();
    let mut provider = db.write().await;
    let charge = provider
        .charges
        .get_mut(&invoice)
        .ok_or_else(|| ProviderFault::charge_not_found(&invoice))?;
    if state_of(charge) != "settled" {
        return Err(ProviderFault::invalid_state(&invoice, state_of(charge)));
    }

    let refunded = charge.get("refunded_amount").and_then(Value::as_u64).unwrap_or(0);
    let refundable = amount_of(charge).saturating_sub(refunded);
    let amount = payload.get("amount").and_then(Value::as_u64).unwrap_or(refundable);
    if amount == 0 || amount > refundable {
        return Err(ProviderFault::new(
            StatusCode::BAD_REQUEST,
            47,
            "Amount too high",
            format!("refund amount {amount} exceeds refundable {refundable}"),
        ));
    }
    charge["refunded_amount"] = json!(refunded + amount);
    let currency = charge.get("currency").cloned().unwrap_or(Value::Null);

    let mut refund = payload;
    let id = Uuid::new_v4().simple().to_string();
    refund.insert("id".to_string(), json!(id));
    refund.insert("state".to_string(), json!("refunded"));
    refund.insert("amount".to_string(), json!(amount));
    refund.insert("currency".to_string(), currency);

    let refund = Value::Object(refund);
    provider.refunds.insert(id, refund.clone());
    Ok(Json(refund))
}

async fn get_refund(State(db): State<Db>, Path(id): Path<String>) -> ProviderResult {
    let provider = db.read().await;
    provider.refunds.get(&id).cloned().map(Json).ok_or_else(|| {
        ProviderFault::new(
            StatusCode::NOT_FOUND,
            13,
            "Refund not found",
            format!("no refund with id {id}"),
        )
    })
}

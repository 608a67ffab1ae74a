//! In-memory stand-in for the YooKassa v3 payments API.
//!
//! Serves the six endpoints the client uses under `/v3`, checks basic auth,
//! requires `Idempotence-Key` on every POST and replays the stored response
//! when a key is reused. Errors use the API's JSON error object.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

pub const IDEMPOTENCE_KEY_HEADER: &str = "idempotence-key";

/// Shop credentials the server accepts.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub shop_id: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(shop_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            shop_id: shop_id.into(),
            secret_key: secret_key.into(),
        }
    }

    fn authorization(&self) -> String {
        let raw = format!("{}:{}", self.shop_id, self.secret_key);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub status: String,
    pub paid: bool,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Value>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub recipient: Value,
    pub test: bool,
    pub refundable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_details: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub status: String,
    pub amount: Amount,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub id: String,
    pub code: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiFailure {
    fn new(status: StatusCode, code: &str, description: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error_type: "error".to_string(),
                id: Uuid::new_v4().to_string(),
                code: code.to_string(),
                description: description.into(),
                parameter: None,
            },
        }
    }

    fn invalid(description: impl Into<String>, parameter: &str) -> Self {
        let mut failure = Self::new(StatusCode::BAD_REQUEST, "invalid_request", description);
        failure.body.parameter = Some(parameter.to_string());
        failure
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Default)]
pub struct Store {
    payments: HashMap<String, Payment>,
    refunds: HashMap<String, Refund>,
    /// (operation, key) -> response body of the first successful call.
    replies: HashMap<(String, String), Value>,
}

#[derive(Clone)]
pub struct AppState {
    credentials: Arc<Credentials>,
    store: Arc<RwLock<Store>>,
}

pub fn app(credentials: Credentials) -> Router {
    let state = AppState {
        credentials: Arc::new(credentials),
        store: Arc::new(RwLock::new(Store::default())),
    };
    let api = Router::new()
        .route("/payments", post(create_payment))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/capture", post(capture_payment))
        .route("/payments/{id}/cancel", post(cancel_payment))
        .route("/refunds", post(create_refund))
        .route("/refunds/{id}", get(get_refund))
        .with_state(state);
    Router::new().nest("/v3", api)
}

pub async fn run(listener: TcpListener, credentials: Credentials) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, shop_id = %credentials.shop_id, "mock YooKassa API listening");
    }
    axum::serve(listener, app(credentials)).await
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiFailure> {
    authorize(&state, &headers)?;
    let key = idempotence_key(&headers)?;
    let scope = "payments".to_string();
    let mut store = state.store.write().await;
    if let Some(reply) = store.replies.get(&(scope.clone(), key.clone())) {
        debug!(%key, "replaying create payment");
        return Ok(Json(reply.clone()));
    }

    let input = parse_body(&body)?;
    let amount = parse_amount(input.get("amount"), "amount")?;
    let capture = input.get("capture").and_then(Value::as_bool).unwrap_or(false);
    let method_data = input.get("payment_method_data").cloned();
    let id = Uuid::new_v4().to_string();
    let now = timestamp();

    let status = if capture {
        "succeeded"
    } else if method_data.is_some() {
        "waiting_for_capture"
    } else {
        "pending"
    };
    let payment_method = method_data.map(|data| {
        serde_json::json!({
            "type": data.get("type").cloned().unwrap_or(Value::Null),
            "id": id,
            "saved": false,
        })
    });
    let confirmation = input.get("confirmation").map(|c| {
        let mut c = c.clone();
        if c.get("type").and_then(Value::as_str) == Some("redirect") {
            c["confirmation_url"] = Value::String(format!("https://mock.yookassa.local/checkout/{id}"));
        }
        c
    });

    let payment = Payment {
        id: id.clone(),
        status: status.to_string(),
        paid: status != "pending",
        amount,
        description: input.get("description").and_then(Value::as_str).map(str::to_string),
        payment_method,
        confirmation,
        created_at: now.clone(),
        captured_at: capture.then_some(now),
        metadata: input.get("metadata").cloned(),
        recipient: serde_json::json!({"account_id": state.credentials.shop_id, "gateway_id": "100700"}),
        test: true,
        refundable: capture,
        refunded_amount: None,
        cancellation_details: None,
    };
    info!(payment_id = %id, status, "payment created");
    store.payments.insert(id, payment.clone());
    Ok(Json(remember(&mut store, scope, key, &payment)?))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Payment>, ApiFailure> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    store
        .payments
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiFailure::not_found("payment"))
}

async fn capture_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiFailure> {
    authorize(&state, &headers)?;
    let key = idempotence_key(&headers)?;
    let scope = format!("payments/{id}/capture");
    let mut store = state.store.write().await;
    if let Some(reply) = store.replies.get(&(scope.clone(), key.clone())) {
        return Ok(Json(reply.clone()));
    }

    let input = parse_body(&body)?;
    let requested = match input.get("amount") {
        Some(raw) => Some(parse_amount(Some(raw), "amount")?),
        None => None,
    };
    let payment = store
        .payments
        .get_mut(&id)
        .ok_or_else(|| ApiFailure::not_found("payment"))?;
    if payment.status != "waiting_for_capture" {
        return Err(ApiFailure::invalid(
            format!("Payment is in status {} and can't be captured", payment.status),
            "status",
        ));
    }
    if let Some(requested) = requested {
        if requested.currency != payment.amount.currency
            || minor_units(&requested.value) > minor_units(&payment.amount.value)
        {
            return Err(ApiFailure::invalid(
                "Capture amount exceeds the authorized amount",
                "amount",
            ));
        }
        payment.amount = requested;
    }
    payment.status = "succeeded".to_string();
    payment.captured_at = Some(timestamp());
    payment.refundable = true;
    let payment = payment.clone();
    info!(payment_id = %id, "payment captured");
    Ok(Json(remember(&mut store, scope, key, &payment)?))
}

async fn cancel_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    authorize(&state, &headers)?;
    let key = idempotence_key(&headers)?;
    let scope = format!("payments/{id}/cancel");
    let mut store = state.store.write().await;
    if let Some(reply) = store.replies.get(&(scope.clone(), key.clone())) {
        return Ok(Json(reply.clone()));
    }

    let payment = store
        .payments
        .get_mut(&id)
        .ok_or_else(|| ApiFailure::not_found("payment"))?;
    if payment.status != "pending" && payment.status != "waiting_for_capture" {
        return Err(ApiFailure::invalid(
            format!("Payment is in status {} and can't be canceled", payment.status),
            "status",
        ));
    }
    payment.status = "canceled".to_string();
    payment.paid = false;
    payment.cancellation_details =
        Some(serde_json::json!({"party": "merchant", "reason": "canceled_by_merchant"}));
    let payment = payment.clone();
    info!(payment_id = %id, "payment canceled");
    Ok(Json(remember(&mut store, scope, key, &payment)?))
}

async fn create_refund(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiFailure> {
    authorize(&state, &headers)?;
    let key = idempotence_key(&headers)?;
    let scope = "refunds".to_string();
    let mut store = state.store.write().await;
    if let Some(reply) = store.replies.get(&(scope.clone(), key.clone())) {
        return Ok(Json(reply.clone()));
    }

    let input = parse_body(&body)?;
    let amount = parse_amount(input.get("amount"), "amount")?;
    let payment_id = input
        .get("payment_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiFailure::invalid("Missing payment_id", "payment_id"))?
        .to_string();
    let payment = store
        .payments
        .get_mut(&payment_id)
        .ok_or_else(|| ApiFailure::not_found("payment"))?;
    if payment.status != "succeeded" {
        return Err(ApiFailure::invalid(
            format!("Payment is in status {} and can't be refunded", payment.status),
            "payment_id",
        ));
    }
    let already = payment
        .refunded_amount
        .as_ref()
        .and_then(|a| minor_units(&a.value))
        .unwrap_or(0);
    let requested = minor_units(&amount.value).unwrap_or(i64::MAX);
    let available = minor_units(&payment.amount.value).unwrap_or(0) - already;
    if amount.currency != payment.amount.currency || requested > available {
        return Err(ApiFailure::invalid(
            "Refund amount exceeds the amount available for refund",
            "amount.value",
        ));
    }
    payment.refunded_amount = Some(Amount {
        value: format_minor(already + requested),
        currency: amount.currency.clone(),
    });
    payment.refundable = already + requested < minor_units(&payment.amount.value).unwrap_or(0);

    let refund = Refund {
        id: Uuid::new_v4().to_string(),
        payment_id,
        status: "succeeded".to_string(),
        amount,
        created_at: timestamp(),
        description: input.get("description").and_then(Value::as_str).map(str::to_string),
    };
    info!(refund_id = %refund.id, payment_id = %refund.payment_id, "refund created");
    store.refunds.insert(refund.id.clone(), refund.clone());
    Ok(Json(remember(&mut store, scope, key, &refund)?))
}

async fn get_refund(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Refund>, ApiFailure> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    store
        .refunds
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiFailure::not_found("refund"))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiFailure> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if provided == Some(state.credentials.authorization().as_str()) {
        return Ok(());
    }
    Err(ApiFailure::new(
        StatusCode::UNAUTHORIZED,
        "invalid_credentials",
        "Authentication by given credentials failed",
    ))
}

fn idempotence_key(headers: &HeaderMap) -> Result<String, ApiFailure> {
    headers
        .get(IDEMPOTENCE_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiFailure::invalid("Idempotence key is required", "Idempotence-Key"))
}

fn parse_body(body: &Bytes) -> Result<Value, ApiFailure> {
    if body.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiFailure::invalid(format!("Malformed JSON: {e}"), "body"))?;
    if !value.is_object() {
        return Err(ApiFailure::invalid("Request body must be an object", "body"));
    }
    Ok(value)
}

fn parse_amount(raw: Option<&Value>, parameter: &str) -> Result<Amount, ApiFailure> {
    let raw = raw.ok_or_else(|| ApiFailure::invalid("Missing amount", parameter))?;
    let amount: Amount = serde_json::from_value(raw.clone())
        .map_err(|_| ApiFailure::invalid("Invalid amount", parameter))?;
    match minor_units(&amount.value) {
        Some(units) if units > 0 => Ok(amount),
        _ => Err(ApiFailure::invalid(
            "Amount must be a positive decimal",
            &format!("{parameter}.value"),
        )),
    }
}

/// `"12.30"` -> `1230`. At most two fractional digits.
fn minor_units(value: &str) -> Option<i64> {
    let (whole, frac) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() || frac.len() > 2 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = format!("{frac:0<2}").parse().ok()?;
    whole.checked_mul(100)?.checked_add(frac)
}

fn format_minor(units: i64) -> String {
    format!("{}.{:02}", units / 100, units % 100)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Record the reply for idempotent replay. A reply that cannot be encoded is
/// a 500 and nothing is stored, so a retry with the same key runs again.
fn remember<T: Serialize>(
    store: &mut Store,
    scope: String,
    key: String,
    reply: &T,
) -> Result<Value, ApiFailure> {
    let value = serde_json::to_value(reply).map_err(|e| {
        error!(error = %e, "failed to encode reply");
        ApiFailure::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_server_error",
            "failed to encode response",
        )
    })?;
    store.replies.insert((scope, key), value.clone());
    Ok(value)
}

//! Typed async client for the YooKassa payments API.
//!
//! # Design
//! `YooKassa` holds the immutable `Config` and a `reqwest` handle and carries
//! no mutable state between calls, so it is cheap to clone and safe to share
//! across tasks. Each operation asks the crate-private transport for raw JSON
//! and decodes it into a model. A transport or API failure is returned
//! unchanged; a 2xx body that does not fit the model is a decode error.
//!
//! Payment and refund ids are percent-encoded into a single path segment, so
//! an id can never address a different resource.
//!
//! Idempotency keys are the caller's business. Pass the same key when
//! re-issuing a request after a failure; `new_idempotence_key` is there for
//! callers that want a fresh UUID.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::{Result, TransportError};
use crate::http::HttpMethod;
use crate::transport::{path_segment, Transport};
use crate::types::{Amount, CapturePayment, CreateRefund, Payment, Refund};

/// Async client for the YooKassa API.
#[derive(Debug, Clone)]
pub struct YooKassa {
    transport: Transport,
}

impl YooKassa {
    /// Build a client from a full configuration.
    ///
    /// Credentials are not checked here; a wrong pair surfaces as a 401
    /// `Error::Api` on the first call.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    /// Build a client with default host, path, timeout and debug settings.
    pub fn with_credentials(
        shop_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self> {
        Self::new(Config::new(shop_id, secret_key))
    }

    pub fn config(&self) -> &Config {
        self.transport.config()
    }

    /// `POST payments`. The payload is sent as-is; the API validates it.
    pub async fn create_payment<P>(&self, payload: &P, idempotence_key: Option<&str>) -> Result<Payment>
    where
        P: Serialize + ?Sized,
    {
        let raw = self
            .transport
            .call(HttpMethod::Post, "payments", Some(payload), idempotence_key)
            .await?;
        decode(raw)
    }

    /// `GET payments/{id}`.
    pub async fn get_payment(&self, payment_id: &str, idempotence_key: Option<&str>) -> Result<Payment> {
        let path = format!("payments/{}", path_segment(payment_id)?);
        let raw = self
            .transport
            .call::<Value>(HttpMethod::Get, &path, None, idempotence_key)
            .await?;
        decode(raw)
    }

    /// `POST payments/{id}/capture`. With `amount` of `None` the body is `{}`
    /// and the whole authorized amount is captured.
    pub async fn capture_payment(
        &self,
        payment_id: &str,
        amount: Option<&Amount>,
        idempotence_key: Option<&str>,
    ) -> Result<Payment> {
        let body = CapturePayment {
            amount: amount.cloned(),
        };
        let raw = self
            .transport
            .call(
                HttpMethod::Post,
                &format!("payments/{}/capture", path_segment(payment_id)?),
                Some(&body),
                idempotence_key,
            )
            .await?;
        decode(raw)
    }

    /// `POST payments/{id}/cancel` with an empty object body.
    pub async fn cancel_payment(&self, payment_id: &str, idempotence_key: Option<&str>) -> Result<Payment> {
        let raw = self
            .transport
            .call(
                HttpMethod::Post,
                &format!("payments/{}/cancel", path_segment(payment_id)?),
                Some(&serde_json::json!({})),
                idempotence_key,
            )
            .await?;
        decode(raw)
    }

    /// `POST refunds` with body `{amount, payment_id}`.
    pub async fn create_refund(
        &self,
        payment_id: &str,
        amount: &Amount,
        idempotence_key: Option<&str>,
    ) -> Result<Refund> {
        let body = CreateRefund {
            amount: amount.clone(),
            payment_id: payment_id.to_string(),
            description: None,
        };
        self.create_refund_with(&body, idempotence_key).await
    }

    /// `POST refunds` with a full payload, for refunds that carry a
    /// description.
    pub async fn create_refund_with(
        &self,
        payload: &CreateRefund,
        idempotence_key: Option<&str>,
    ) -> Result<Refund> {
        let raw = self
            .transport
            .call(HttpMethod::Post, "refunds", Some(payload), idempotence_key)
            .await?;
        decode(raw)
    }

    /// `GET refunds/{id}`.
    pub async fn get_refund(&self, refund_id: &str, idempotence_key: Option<&str>) -> Result<Refund> {
        let path = format!("refunds/{}", path_segment(refund_id)?);
        let raw = self
            .transport
            .call::<Value>(HttpMethod::Get, &path, None, idempotence_key)
            .await?;
        decode(raw)
    }
}

/// Fresh UUID v4 suitable as an `Idempotence-Key`.
pub fn new_idempotence_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn decode<T: DeserializeOwned>(raw: Value) -> Result<T> {
    serde_json::from_value(raw).map_err(|e| TransportError::Decode(e).into())
}

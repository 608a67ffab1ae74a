//! Async client for the YooKassa payments API.
//!
//! # Overview
//! Creates, fetches, captures and cancels payments, and creates and fetches
//! refunds. Every call is one authenticated HTTPS request with a JSON body;
//! the JSON response is decoded into a typed model.
//!
//! # Design
//! - `YooKassa` is stateless apart from its immutable `Config`; share it by
//!   cloning.
//! - The transport layer (build request, execute, parse response) is private
//!   and returns raw JSON. The public surface only deals in models.
//! - A call is a single attempt. Retrying is up to the caller, who should
//!   reuse the same idempotency key.
//! - Logging goes through `tracing`. Set `Config::debug` to log raw request
//!   and response bodies at `debug` level.
//!
//! ```no_run
//! use yookassa_core::{Amount, ConfirmationRequest, CreatePayment, PaymentMethodData, YooKassa};
//!
//! # async fn run() -> yookassa_core::Result<()> {
//! let client = YooKassa::with_credentials("100500", "test_secret")?;
//! let mut payload = CreatePayment::new(Amount::rub("2.00"));
//! payload.payment_method_data = Some(PaymentMethodData::of_type("bank_card"));
//! payload.confirmation = Some(ConfirmationRequest::redirect("https://example.com"));
//!
//! let key = yookassa_core::new_idempotence_key();
//! let payment = client.create_payment(&payload, Some(key.as_str())).await?;
//! println!("{} is {:?}", payment.id, payment.status);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
mod transport;
pub mod types;

pub use client::{new_idempotence_key, YooKassa};
pub use config::{Config, ConfigError};
pub use error::{ApiErrorBody, Error, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::IDEMPOTENCE_KEY_HEADER;
pub use types::{
    Amount, CancellationDetails, CapturePayment, Confirmation, ConfirmationRequest, CreatePayment,
    CreateRefund, Payment, PaymentMethod, PaymentMethodData, PaymentStatus, Recipient, Refund,
    RefundStatus, Timestamp,
};

/// Crate version, also sent in the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

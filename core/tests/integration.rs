//! Full payment and refund lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every client
//! operation over real HTTP. Validates that request building, auth,
//! idempotency headers and response decoding line up with the server.

use std::time::Duration;

use mock_server::Credentials;
use yookassa_core::{
    new_idempotence_key, Amount, Config, ConfirmationRequest, CreatePayment, PaymentMethodData,
    PaymentStatus, RefundStatus, YooKassa,
};

const SHOP_ID: &str = "100500";
const SECRET: &str = "test_secret";

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener, Credentials::new(SHOP_ID, SECRET)));
    format!("http://{addr}")
}

fn client(base_host: &str, secret: &str) -> YooKassa {
    let config = Config::new(SHOP_ID, secret)
        .with_base_host(base_host)
        .with_timeout(Duration::from_secs(5))
        .with_debug(true);
    YooKassa::new(config).unwrap()
}

fn card_payment(value: &str) -> CreatePayment {
    let mut payload = CreatePayment::new(Amount::rub(value));
    payload.payment_method_data = Some(PaymentMethodData::of_type("bank_card"));
    payload.confirmation = Some(ConfirmationRequest::redirect("https://example.com"));
    payload.description = Some("Order 37".to_string());
    payload
}

#[tokio::test]
async fn payment_and_refund_lifecycle() {
    let base = start_server().await;
    let client = client(&base, SECRET);

    // Step 1: create a two-stage card payment.
    let key = new_idempotence_key();
    let created = client.create_payment(&card_payment("2.00"), Some(key.as_str())).await.unwrap();
    assert_eq!(created.status, PaymentStatus::WaitingForCapture);
    assert!(created.paid);
    assert_eq!(created.amount, Amount::rub("2.00"));
    assert_eq!(created.description.as_deref(), Some("Order 37"));
    assert!(created.confirmation_url().unwrap().ends_with(&created.id));

    // Step 2: re-issuing with the same key returns the same payment.
    let replayed = client.create_payment(&card_payment("2.00"), Some(key.as_str())).await.unwrap();
    assert_eq!(replayed.id, created.id);

    // Step 3: fetch it back.
    let fetched = client.get_payment(&created.id, None).await.unwrap();
    assert_eq!(fetched, created);

    // Step 4: capture the full amount.
    let captured = client
        .capture_payment(&created.id, Some(&Amount::rub("2.00")), Some(new_idempotence_key().as_str()))
        .await
        .unwrap();
    assert_eq!(captured.status, PaymentStatus::Succeeded);
    assert!(captured.captured_at.is_some());

    // Step 5: partial refund.
    let refund = client
        .create_refund(&created.id, &Amount::rub("0.50"), Some(new_idempotence_key().as_str()))
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Succeeded);
    assert_eq!(refund.payment_id, created.id);
    assert_eq!(refund.amount, Amount::rub("0.50"));

    // Step 6: fetch the refund and the updated payment.
    let fetched_refund = client.get_refund(&refund.id, None).await.unwrap();
    assert_eq!(fetched_refund, refund);
    let payment = client.get_payment(&created.id, None).await.unwrap();
    assert_eq!(payment.refunded_amount, Some(Amount::rub("0.50")));

    // Step 7: cancelling a captured payment is rejected by the API.
    let err = client
        .cancel_payment(&created.id, Some(new_idempotence_key().as_str()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.details().unwrap().code.as_deref(), Some("invalid_request"));
}

#[tokio::test]
async fn cancel_payment_before_capture() {
    let base = start_server().await;
    let client = client(&base, SECRET);

    let created = client
        .create_payment(&card_payment("15.00"), Some(new_idempotence_key().as_str()))
        .await
        .unwrap();
    let canceled = client
        .cancel_payment(&created.id, Some(new_idempotence_key().as_str()))
        .await
        .unwrap();
    assert_eq!(canceled.status, PaymentStatus::Canceled);
    assert!(!canceled.paid);
    assert_eq!(canceled.cancellation_details.unwrap().party, "merchant");
}

#[tokio::test]
async fn missing_idempotence_key_is_rejected_by_server() {
    let base = start_server().await;
    let client = client(&base, SECRET);

    let err = client.create_payment(&card_payment("2.00"), None).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(
        err.details().unwrap().parameter.as_deref(),
        Some("Idempotence-Key")
    );
}

#[tokio::test]
async fn wrong_credentials_surface_as_api_error() {
    let base = start_server().await;
    let client = client(&base, "wrong_secret");

    let err = client.get_payment("anything", None).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.details().unwrap().code.as_deref(), Some("invalid_credentials"));
}

#[tokio::test]
async fn unknown_resources_return_not_found() {
    let base = start_server().await;
    let client = client(&base, SECRET);

    let err = client.get_payment("missing", None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    let err = client.get_refund("missing", None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{addr}"), SECRET);
    let err = client.get_payment("p1", None).await.unwrap_err();
    assert!(matches!(err, yookassa_core::Error::Transport(_)));
    assert_eq!(err.status(), None);
}

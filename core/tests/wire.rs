//! Wire-level checks: exact method, path, body and headers of every
//! operation, plus error and timeout mapping, against a `wiremock` server.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use yookassa_core::{
    Amount, Config, Error, PaymentStatus, RefundStatus, TransportError, YooKassa,
};

const KEY: &str = "6daac9fa-342d-4264-91c5-b5eafd1a0010";
// base64("100500:test_secret")
const AUTH: &str = "Basic MTAwNTAwOnRlc3Rfc2VjcmV0";

fn client(server: &MockServer) -> YooKassa {
    YooKassa::new(Config::new("100500", "test_secret").with_base_host(server.uri())).unwrap()
}

fn payment_body(status: &str) -> Value {
    json!({
        "id": "215d8da0-000f-50be-b000-0003308c89be",
        "status": status,
        "paid": status != "pending",
        "amount": {"value": "2.00", "currency": "RUB"},
        "recipient": {"account_id": "100500", "gateway_id": "100700"},
        "payment_method": {"type": "bank_card", "id": "215d8da0-000f-50be-b000-0003308c89be", "saved": false},
        "created_at": "2018-07-18T10:51:18.139Z",
        "test": false,
        "refundable": false,
        "metadata": {}
    })
}

fn refund_body() -> Value {
    json!({
        "id": "216749f7-0016-50be-b000-078d43a63ae4",
        "status": "succeeded",
        "amount": {"value": "1.00", "currency": "RUB"},
        "created_at": "2017-10-04T19:27:51.407Z",
        "payment_id": "215d8da0-000f-50be-b000-0003308c89be"
    })
}

async fn single_request(server: &MockServer) -> Request {
    let mut requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "expected exactly one request");
    requests.remove(0)
}

#[tokio::test]
async fn create_payment_example_scenario() {
    let server = MockServer::start().await;
    let payload = json!({
        "amount": {"value": "2.00", "currency": "RUB"},
        "payment_method_data": {"type": "bank_card"},
        "confirmation": {"type": "redirect", "return_url": "https://example.com"}
    });
    let response = payment_body("waiting_for_capture");
    Mock::given(method("POST"))
        .and(path("/v3/payments"))
        .and(header("Idempotence-Key", KEY))
        .and(header("Authorization", AUTH))
        .and(header("Content-Type", "application/json"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .expect(1)
        .mount(&server)
        .await;

    let payment = client(&server).create_payment(&payload, Some(KEY)).await.unwrap();
    assert_eq!(payment.id, "215d8da0-000f-50be-b000-0003308c89be");
    assert_eq!(payment.status, PaymentStatus::WaitingForCapture);
    assert!(payment.paid);
    // Fields equal the server's JSON verbatim.
    assert_eq!(serde_json::to_value(&payment).unwrap(), response);
}

#[tokio::test]
async fn get_payment_is_a_get_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/payments/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_body("pending")))
        .mount(&server)
        .await;

    let payment = client(&server).get_payment("p-1", None).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    let req = single_request(&server).await;
    assert!(req.body.is_empty());
    assert!(req.headers.get("content-type").is_none());
    assert!(req.headers.get("idempotence-key").is_none());
}

#[tokio::test]
async fn capture_payment_sends_exactly_the_amount() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/payments/p-1/capture"))
        .and(body_json(json!({"amount": {"value": "2.00", "currency": "RUB"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_body("succeeded")))
        .expect(1)
        .mount(&server)
        .await;

    let payment = client(&server)
        .capture_payment("p-1", Some(&Amount::rub("2.00")), Some(KEY))
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
}

#[tokio::test]
async fn capture_without_amount_sends_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/payments/p-1/capture"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_body("succeeded")))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).capture_payment("p-1", None, Some(KEY)).await.unwrap();
}

#[tokio::test]
async fn cancel_payment_sends_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/payments/p-1/cancel"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_body("canceled")))
        .expect(1)
        .mount(&server)
        .await;

    let payment = client(&server).cancel_payment("p-1", Some(KEY)).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Canceled);
}

#[tokio::test]
async fn create_refund_sends_amount_and_payment_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/refunds"))
        .and(body_json(json!({
            "amount": {"value": "1.00", "currency": "RUB"},
            "payment_id": "215d8da0-000f-50be-b000-0003308c89be"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(refund_body()))
        .expect(1)
        .mount(&server)
        .await;

    let refund = client(&server)
        .create_refund("215d8da0-000f-50be-b000-0003308c89be", &Amount::rub("1.00"), Some(KEY))
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Succeeded);
    assert_eq!(refund.payment_id, "215d8da0-000f-50be-b000-0003308c89be");
}

#[tokio::test]
async fn get_refund_is_a_get_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/refunds/216749f7-0016-50be-b000-078d43a63ae4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refund_body()))
        .mount(&server)
        .await;

    let refund = client(&server)
        .get_refund("216749f7-0016-50be-b000-078d43a63ae4", None)
        .await
        .unwrap();
    assert_eq!(refund.amount, Amount::rub("1.00"));
    assert!(single_request(&server).await.body.is_empty());
}

#[tokio::test]
async fn idempotence_key_absent_when_omitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_body("pending")))
        .mount(&server)
        .await;

    client(&server)
        .create_payment(&json!({"amount": {"value": "2.00", "currency": "RUB"}}), None)
        .await
        .unwrap();

    let req = single_request(&server).await;
    assert!(req.headers.get("idempotence-key").is_none());
    assert_eq!(req.headers.get("authorization").unwrap(), AUTH);
}

#[tokio::test]
async fn idempotence_key_passed_through_verbatim_on_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/payments/p-1"))
        .and(header("Idempotence-Key", "caller-chosen key 1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_body("pending")))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .get_payment("p-1", Some("caller-chosen key 1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn non_success_status_is_api_error_with_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/payments"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "id": "ab0d9a45-c0b6-4d5b-b6f1-e38d0dd7cc0b",
            "code": "invalid_request",
            "description": "Value of amount.value is too small",
            "parameter": "amount.value"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_payment(&json!({"amount": {"value": "0.00", "currency": "RUB"}}), Some(KEY))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    let details = err.details().unwrap();
    assert_eq!(details.error_type, "error");
    assert_eq!(details.code.as_deref(), Some("invalid_request"));
    assert_eq!(details.parameter.as_deref(), Some("amount.value"));
}

#[tokio::test]
async fn server_error_without_json_keeps_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/refunds/r-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    match client(&server).get_refund("r-1", None).await.unwrap_err() {
        Error::Api { status, body, details } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
            assert!(details.is_none());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_success_body_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/payments/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":"))
        .mount(&server)
        .await;

    let err = client(&server).get_payment("p-1", None).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn response_not_matching_model_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/payments/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p-1"})))
        .mount(&server)
        .await;

    let err = client(&server).get_payment("p-1", None).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn timeout_aborts_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/payments/p-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(payment_body("pending"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = YooKassa::new(
        Config::new("100500", "test_secret")
            .with_base_host(server.uri())
            .with_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    let err = client.get_payment("p-1", None).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn no_retry_after_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/payments/p-1/cancel"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).cancel_payment("p-1", Some(KEY)).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn ids_are_escaped_into_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_body("pending")))
        .mount(&server)
        .await;

    client(&server).get_payment("../refunds/r1", None).await.unwrap();
    let req = single_request(&server).await;
    assert_eq!(req.url.path(), "/v3/payments/..%2Frefunds%2Fr1");

    server.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_body("canceled")))
        .mount(&server)
        .await;
    client(&server).cancel_payment("abc?x=1", Some(KEY)).await.unwrap();
    let req = single_request(&server).await;
    assert_eq!(req.url.path(), "/v3/payments/abc%3Fx%3D1/cancel");
    assert_eq!(req.url.query(), None);
}

#[tokio::test]
async fn dot_and_empty_ids_never_reach_the_network() {
    let server = MockServer::start().await;
    let client = client(&server);

    for id in ["", ".", ".."] {
        let err = client.get_refund(id, None).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::InvalidResourceId(_))));
        let err = client.capture_payment(id, None, Some(KEY)).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::InvalidResourceId(_))));
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn fields_the_server_omits_stay_omitted() {
    let server = MockServer::start().await;
    let response = json!({
        "id": "p-1",
        "status": "pending",
        "paid": false,
        "amount": {"value": "2.00", "currency": "RUB"},
        "payment_method": {"type": "bank_card"},
        "created_at": "2018-07-18T13:51:18.1+03:00"
    });
    Mock::given(method("GET"))
        .and(path("/v3/payments/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .mount(&server)
        .await;

    let payment = client(&server).get_payment("p-1", None).await.unwrap();
    assert_eq!(payment.test, None);
    assert_eq!(serde_json::to_value(&payment).unwrap(), response);
}

//! Tests for the HTTP facilitator-client stub against a mocked facilitator,
//! distinguishing a non-2xx transport failure from a successfully-parsed
//! `{isValid:false}` verdict.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use x402_axum::facilitator_client::{FacilitatorClient, FacilitatorClientError};
use x402_types::proto::{self, VerifyOutcome};

fn verify_request() -> proto::VerifyRequest {
    let raw = serde_json::value::to_raw_value(&json!({
        "x402Version": 2,
        "paymentPayload": {
            "accepted": {
                "scheme": "exact",
                "network": "eip155:84532",
                "amount": "1000000",
                "payTo": "0xBAc675C310721717Cd4A37F6cbeA1F081b1C2a07",
                "maxTimeoutSeconds": 60,
                "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                "extra": null
            },
            "payload": { "signature": "0xsignature" },
            "resource": null,
            "x402Version": 2
        },
        "paymentRequirements": {
            "scheme": "exact",
            "network": "eip155:84532",
            "amount": "1000000",
            "payTo": "0xBAc675C310721717Cd4A37F6cbeA1F081b1C2a07",
            "maxTimeoutSeconds": 60,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": null
        }
    }))
    .unwrap();
    proto::VerifyRequest::from(raw)
}

#[tokio::test]
async fn verify_parses_a_successful_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isValid": true,
            "payer": "0xPayer"
        })))
        .mount(&server)
        .await;

    let client = FacilitatorClient::try_from(server.uri().as_str()).unwrap();
    let response = client.verify(verify_request()).await.unwrap();
    let outcome = VerifyOutcome::try_from(response).unwrap();
    assert!(matches!(outcome, VerifyOutcome::Valid { payer } if payer == "0xPayer"));
}

#[tokio::test]
async fn verify_parses_a_rejected_verdict_distinct_from_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isValid": false,
            "invalidReason": "recipient_mismatch"
        })))
        .mount(&server)
        .await;

    let client = FacilitatorClient::try_from(server.uri().as_str()).unwrap();
    let response = client.verify(verify_request()).await.unwrap();
    let outcome = VerifyOutcome::try_from(response).unwrap();
    assert!(matches!(outcome, VerifyOutcome::Invalid { reason, .. } if reason == "recipient_mismatch"));
}

#[tokio::test]
async fn non_2xx_response_surfaces_as_http_status_not_a_parsed_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(503).set_body_string("facilitator overloaded"))
        .mount(&server)
        .await;

    let client = FacilitatorClient::try_from(server.uri().as_str()).unwrap();
    let err = client.verify(verify_request()).await.unwrap_err();
    assert!(matches!(err, FacilitatorClientError::HttpStatus { status, .. } if status.as_u16() == 503));
}

#[tokio::test]
async fn settle_parses_a_successful_settlement() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "payer": "0xPayer",
            "transaction": "0xabc123",
            "network": "eip155:84532"
        })))
        .mount(&server)
        .await;

    let client = FacilitatorClient::try_from(server.uri().as_str()).unwrap();
    let response = client.settle(verify_request()).await.unwrap();
    let json_value: serde_json::Value = response.0;
    assert_eq!(json_value["transaction"], "0xabc123");
}

#[tokio::test]
async fn supported_endpoint_is_fetched_via_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/supported"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kinds": [{ "x402Version": 2, "scheme": "exact", "network": "eip155:84532" }],
            "extensions": [],
            "signers": {}
        })))
        .mount(&server)
        .await;

    let client = FacilitatorClient::try_from(server.uri().as_str()).unwrap();
    let supported = client.supported().await.unwrap();
    assert_eq!(supported.kinds.len(), 1);
    assert_eq!(supported.kinds[0].scheme, "exact");
}

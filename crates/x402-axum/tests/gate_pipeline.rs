//! End-to-end tests of the gate pipeline: route match, 402 emission, verify,
//! downstream invocation, and the fair-billing settle decision, driven
//! through the actual `tower::Layer`/`tower::Service` stack rather than by
//! calling `Paygate` methods directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use tower::ServiceExt;

use x402_axum::{RouteConfig, X402GateBuilder};
use x402_scheme::{
    AssetAmount, PriceSpec, ResourceServerSchemeHandler, ResourceServerSchemeRegistry,
    SchemeHandlerError,
};
use x402_types::chain::{ChainId, ChainIdPattern};
use x402_types::facilitator::FacilitatorClient;
use x402_types::proto::v2::{self, PaymentPayload, PaymentRequirements};
use x402_types::proto::{
    SettleOutcome, SettleRequest, SettleResponse, SupportedResponse, VerifyOutcome, VerifyRequest,
    VerifyResponse,
};
use x402_types::util::Base64Bytes;

const NETWORK: &str = "eip155:84532";
const SCHEME: &str = "exact";
const ASSET: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
const PAY_TO: &str = "0xBAc675C310721717Cd4A37F6cbeA1F081b1C2a07";

/// Ignores the route's configured price entirely and always resolves to a
/// fixed asset amount, so tests don't need a real chain crate.
struct FixedPriceHandler;

impl ResourceServerSchemeHandler for FixedPriceHandler {
    fn parse_price(
        &self,
        _price: &PriceSpec,
        _network: &ChainId,
    ) -> Result<AssetAmount, SchemeHandlerError> {
        Ok(AssetAmount {
            amount: "1000000".to_string(),
            asset: ASSET.to_string(),
            extra: None,
        })
    }
}

#[derive(Clone)]
enum VerifyBehavior {
    Valid,
    Invalid(String),
    Unreachable,
}

#[derive(Clone)]
enum SettleBehavior {
    Success,
    Error(String),
    TransportFailure,
}

#[derive(Clone)]
struct MockFacilitator {
    verify_behavior: VerifyBehavior,
    settle_behavior: SettleBehavior,
    verify_calls: Arc<AtomicUsize>,
    settle_calls: Arc<AtomicUsize>,
}

impl MockFacilitator {
    fn new(verify_behavior: VerifyBehavior, settle_behavior: SettleBehavior) -> Self {
        Self {
            verify_behavior,
            settle_behavior,
            verify_calls: Arc::new(AtomicUsize::new(0)),
            settle_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FacilitatorClient for MockFacilitator {
    type Error = String;

    async fn verify(&self, _request: VerifyRequest) -> Result<VerifyResponse, String> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match &self.verify_behavior {
            VerifyBehavior::Valid => Ok(VerifyOutcome::valid("0xPayer".to_string()).into()),
            VerifyBehavior::Invalid(reason) => {
                Ok(VerifyOutcome::invalid(None, reason.clone()).into())
            }
            VerifyBehavior::Unreachable => Err("connection refused".to_string()),
        }
    }

    async fn settle(&self, _request: SettleRequest) -> Result<SettleResponse, String> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        match &self.settle_behavior {
            SettleBehavior::Success => Ok(SettleOutcome::Success {
                payer: "0xPayer".to_string(),
                transaction: "0xdeadbeef".to_string(),
                network: NETWORK.to_string(),
            }
            .into()),
            SettleBehavior::Error(reason) => Ok(SettleOutcome::Error {
                reason: reason.clone(),
                payer: Some("0xPayer".to_string()),
                transaction: String::new(),
                network: NETWORK.to_string(),
            }
            .into()),
            SettleBehavior::TransportFailure => Err("settlement timed out".to_string()),
        }
    }

    async fn supported(&self) -> Result<SupportedResponse, String> {
        Ok(SupportedResponse::default())
    }
}

fn premium_route() -> RouteConfig {
    serde_json::from_value(serde_json::json!({
        "path": "/premium",
        "description": "premium content",
        "accepts": [
            { "network": NETWORK, "scheme": SCHEME, "price": "$0.01", "payTo": PAY_TO }
        ],
    }))
    .unwrap()
}

fn build_app(facilitator: MockFacilitator) -> Router {
    let mut registry = ResourceServerSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        SCHEME,
        2,
        Arc::new(FixedPriceHandler) as Arc<_>,
    );

    let gate = X402GateBuilder::new(facilitator, Arc::new(registry))
        .route(premium_route())
        .build();

    Router::new()
        .route("/premium", get(|| async { "VIP content" }))
        .route(
            "/fails",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        )
        .route("/free", get(|| async { "free content" }))
        .layer(gate)
}

fn valid_payment_header() -> String {
    let requirements = PaymentRequirements {
        scheme: SCHEME.to_string(),
        network: ChainId::new("eip155", "84532"),
        amount: "1000000".to_string(),
        pay_to: PAY_TO.to_string(),
        max_timeout_seconds: 60,
        asset: ASSET.to_string(),
        extra: None,
        resource: None,
        extensions: None,
    };
    let payload: PaymentPayload<PaymentRequirements, serde_json::Value> = PaymentPayload {
        accepted: requirements,
        payload: serde_json::json!({ "signature": "0xsignature" }),
        resource: None,
        extensions: None,
        x402_version: v2::X402Version2,
    };
    let json = serde_json::to_vec(&payload).unwrap();
    Base64Bytes::encode(json).to_string()
}

fn mismatched_payment_header() -> String {
    let requirements = PaymentRequirements {
        scheme: SCHEME.to_string(),
        network: ChainId::new("eip155", "84532"),
        amount: "1000000".to_string(),
        pay_to: "0xSomeoneElse".to_string(),
        max_timeout_seconds: 60,
        asset: ASSET.to_string(),
        extra: None,
        resource: None,
        extensions: None,
    };
    let payload: PaymentPayload<PaymentRequirements, serde_json::Value> = PaymentPayload {
        accepted: requirements,
        payload: serde_json::json!({ "signature": "0xsignature" }),
        resource: None,
        extensions: None,
        x402_version: v2::X402Version2,
    };
    let json = serde_json::to_vec(&payload).unwrap();
    Base64Bytes::encode(json).to_string()
}

/// S1: a route with no configured accepts passes through untouched, with no
/// facilitator interaction at all.
#[tokio::test]
async fn free_route_passes_through_untouched() {
    let facilitator = MockFacilitator::new(VerifyBehavior::Valid, SettleBehavior::Success);
    let app = build_app(facilitator.clone());

    let response = app
        .oneshot(Request::get("/free").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 0);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
}

/// S2: requesting a protected route with no `X-PAYMENT` header gets a `402`
/// whose `accepts` mirrors the route configuration, and `error` is absent.
#[tokio::test]
async fn protected_route_without_payment_header_emits_402() {
    let facilitator = MockFacilitator::new(VerifyBehavior::Valid, SettleBehavior::Success);
    let app = build_app(facilitator.clone());

    let response = app
        .oneshot(Request::get("/premium").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json.get("error").is_none());
    let accepts = json["accepts"].as_array().unwrap();
    assert_eq!(accepts.len(), 1);
    assert_eq!(accepts[0]["scheme"], SCHEME);
    assert_eq!(accepts[0]["payTo"], PAY_TO);
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 0);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
}

/// S3: a matching, verifiable payment on a handler that succeeds causes
/// exactly one verify and one settle call, and the response carries the
/// settlement receipt.
#[tokio::test]
async fn happy_path_verifies_once_and_settles_once() {
    let facilitator = MockFacilitator::new(VerifyBehavior::Valid, SettleBehavior::Success);
    let app = build_app(facilitator.clone());

    let response = app
        .oneshot(
            Request::get("/premium")
                .header("X-PAYMENT", valid_payment_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-PAYMENT-RESPONSE"));
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 1);
}

/// S4: fair billing — a downstream 5xx must never be settled.
#[tokio::test]
async fn downstream_server_error_skips_settlement() {
    let facilitator = MockFacilitator::new(VerifyBehavior::Valid, SettleBehavior::Success);
    let app = build_app(facilitator.clone());

    // Route the paid request at /premium's sibling /fails by building a
    // second app sharing the same gate configuration is unnecessary here:
    // reuse /premium's accepts but point the request at a route that always
    // 500s by layering the gate over a router whose handler fails. We model
    // this by swapping which path backs "premium" in the app builder.
    let mut registry = ResourceServerSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        SCHEME,
        2,
        Arc::new(FixedPriceHandler) as Arc<_>,
    );
    let gate = X402GateBuilder::new(facilitator.clone(), Arc::new(registry))
        .route(premium_route())
        .build();
    let failing_app = Router::new()
        .route(
            "/premium",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        )
        .layer(gate);

    let response = failing_app
        .oneshot(
            Request::get("/premium")
                .header("X-PAYMENT", valid_payment_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.headers().contains_key("X-PAYMENT-RESPONSE"));
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
}

/// S5: a settlement failure still returns a `402`, but the failed receipt is
/// attached for diagnostics.
#[tokio::test]
async fn settlement_failure_returns_402_with_receipt_attached() {
    let facilitator = MockFacilitator::new(
        VerifyBehavior::Valid,
        SettleBehavior::Error("insufficient_funds".to_string()),
    );
    let app = build_app(facilitator.clone());

    let response = app
        .oneshot(
            Request::get("/premium")
                .header("X-PAYMENT", valid_payment_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(response.headers().contains_key("X-PAYMENT-RESPONSE"));
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "insufficient_funds");
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 1);
}

/// S6: a payload whose `accepted` fields don't match any configured accept
/// never reaches verify.
#[tokio::test]
async fn mismatched_accepted_fields_skip_verification() {
    let facilitator = MockFacilitator::new(VerifyBehavior::Valid, SettleBehavior::Success);
    let app = build_app(facilitator.clone());

    let response = app
        .oneshot(
            Request::get("/premium")
                .header("X-PAYMENT", mismatched_payment_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "no_matching_requirement");
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 0);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
}

/// A second `X-PAYMENT` header is rejected outright as malformed, matching
/// the "duplicate header" edge case rather than silently picking one.
#[tokio::test]
async fn duplicate_payment_header_is_rejected() {
    let facilitator = MockFacilitator::new(VerifyBehavior::Valid, SettleBehavior::Success);
    let app = build_app(facilitator.clone());

    let header = valid_payment_header();
    let response = app
        .oneshot(
            Request::get("/premium")
                .header("X-PAYMENT", header.clone())
                .header("X-PAYMENT", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_payload");
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 0);
}

/// A verification outcome of `Invalid` maps to `402` with the scheme's
/// reported reason, and never reaches settle.
#[tokio::test]
async fn invalid_verification_never_settles() {
    let facilitator = MockFacilitator::new(
        VerifyBehavior::Invalid("recipient_mismatch".to_string()),
        SettleBehavior::Success,
    );
    let app = build_app(facilitator.clone());

    let response = app
        .oneshot(
            Request::get("/premium")
                .header("X-PAYMENT", valid_payment_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "recipient_mismatch");
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
}

/// A facilitator that can't be reached at verify time maps to
/// `facilitator_unreachable`, a distinct condition from a parsed invalid
/// verdict.
#[tokio::test]
async fn unreachable_facilitator_maps_to_facilitator_unreachable() {
    let facilitator = MockFacilitator::new(VerifyBehavior::Unreachable, SettleBehavior::Success);
    let app = build_app(facilitator.clone());

    let response = app
        .oneshot(
            Request::get("/premium")
                .header("X-PAYMENT", valid_payment_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "facilitator_unreachable");
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
}

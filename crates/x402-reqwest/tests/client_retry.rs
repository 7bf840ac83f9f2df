//! End-to-end tests of the client-side retry middleware against a mocked
//! protected resource: at-most-one retry, policy-driven selection order,
//! before/after hook firing (and abort-on-error), and settlement receipt
//! decoding.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::Client;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use x402_reqwest::{
    ClientError, PaymentPolicy, ReqwestWithPayments, ReqwestWithPaymentsBuild, RequestContext,
    X402Client, settlement_receipt,
};
use x402_scheme::{ClientSchemeHandler, ClientSchemeRegistry, SchemeHandlerError};
use x402_types::chain::{ChainId, ChainIdPattern};
use x402_types::proto::v2::{PaymentRequirements, ResourceInfo};
use x402_types::util::Base64Bytes;

const NETWORK: &str = "eip155:84532";
const ASSET: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
const PAY_TO: &str = "0xBAc675C310721717Cd4A37F6cbeA1F081b1C2a07";

/// Signs anything handed to it with a fixed fake signature and counts calls,
/// so tests can assert a signer was invoked exactly once.
#[derive(Clone)]
struct CountingSigner {
    scheme: &'static str,
    calls: Arc<AtomicUsize>,
}

impl CountingSigner {
    fn new(scheme: &'static str) -> Self {
        Self {
            scheme,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl ClientSchemeHandler for CountingSigner {
    async fn sign(
        &self,
        requirements: &PaymentRequirements,
        _resource_url: &str,
    ) -> Result<serde_json::Value, SchemeHandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({
            "signature": "0xsignature",
            "scheme": self.scheme,
            "amount": requirements.amount,
        }))
    }
}

/// Always refuses to sign, so selection must skip past it.
struct RefusingSigner;

#[async_trait::async_trait]
impl ClientSchemeHandler for RefusingSigner {
    async fn sign(
        &self,
        _requirements: &PaymentRequirements,
        _resource_url: &str,
    ) -> Result<serde_json::Value, SchemeHandlerError> {
        Err(SchemeHandlerError::Rejected("never signs".to_string()))
    }
}

fn requirements(scheme: &str, amount: &str) -> PaymentRequirements {
    PaymentRequirements {
        scheme: scheme.to_string(),
        network: ChainId::new("eip155", "84532"),
        amount: amount.to_string(),
        pay_to: PAY_TO.to_string(),
        max_timeout_seconds: 60,
        asset: ASSET.to_string(),
        extra: None,
        resource: None,
        extensions: None,
    }
}

fn payment_required_body(accepts: Vec<PaymentRequirements>) -> serde_json::Value {
    serde_json::json!({
        "x402Version": 2,
        "resource": ResourceInfo {
            description: "protected resource".to_string(),
            mime_type: "text/plain".to_string(),
            url: "/protected".to_string(),
        },
        "accepts": accepts,
    })
}

async fn mount_protected_route(server: &MockServer, accepts: Vec<PaymentRequirements>) {
    Mock::given(method("GET"))
        .and(path("/protected"))
        .respond_with(ResponseTemplate::new(402).set_body_json(payment_required_body(accepts)))
        .up_to_n_times(1)
        .mount(server)
        .await;

    let receipt = serde_json::json!({
        "success": true,
        "payer": "0xPayer",
        "transaction": "0xdeadbeef",
        "network": NETWORK,
    });
    let encoded = Base64Bytes::encode(serde_json::to_vec(&receipt).unwrap()).to_string();

    Mock::given(method("GET"))
        .and(path("/protected"))
        .and(header_exists("X-PAYMENT"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("paid content")
                .append_header("X-PAYMENT-RESPONSE", encoded.as_str()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn retries_exactly_once_after_a_402() {
    let server = MockServer::start().await;
    mount_protected_route(&server, vec![requirements("exact", "1000000")]).await;

    let signer = CountingSigner::new("exact");
    let calls = signer.calls.clone();

    let mut registry = ClientSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        "exact",
        2,
        Arc::new(signer) as Arc<_>,
    );
    let x402_client = X402Client::new(Arc::new(registry));
    let http_client = Client::new().with_payments(x402_client).build();

    let response = http_client
        .get(format!("{}/protected", server.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let receipt = settlement_receipt(&response).expect("settlement receipt attached");
    assert_eq!(receipt.0["transaction"], "0xdeadbeef");

    assert_eq!(response.text().await.unwrap(), "paid content");
}

#[tokio::test]
async fn second_402_is_surfaced_without_a_second_retry() {
    let server = MockServer::start().await;
    // Every response is a 402, regardless of the payment header, so the
    // middleware's single retry is exhausted and the second 402 passes through.
    Mock::given(method("GET"))
        .and(path("/always-402"))
        .respond_with(
            ResponseTemplate::new(402)
                .set_body_json(payment_required_body(vec![requirements("exact", "1000000")])),
        )
        .mount(&server)
        .await;

    let signer = CountingSigner::new("exact");
    let calls = signer.calls.clone();
    let mut registry = ClientSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        "exact",
        2,
        Arc::new(signer) as Arc<_>,
    );
    let http_client = Client::new()
        .with_payments(X402Client::new(Arc::new(registry)))
        .build();

    let response = http_client
        .get(format!("{}/always-402", server.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 402);
    // Signed once, for the single retry attempt; the retried request's 402
    // is not retried again.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn selection_skips_a_refusing_signer_for_a_later_matching_one() {
    let server = MockServer::start().await;
    mount_protected_route(
        &server,
        vec![requirements("refuses", "1000000"), requirements("exact", "2000000")],
    )
    .await;

    let signer = CountingSigner::new("exact");
    let calls = signer.calls.clone();
    let mut registry = ClientSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        "refuses",
        2,
        Arc::new(RefusingSigner) as Arc<_>,
    );
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        "exact",
        2,
        Arc::new(signer) as Arc<_>,
    );
    let http_client = Client::new()
        .with_payments(X402Client::new(Arc::new(registry)))
        .build();

    let response = http_client
        .get(format!("{}/protected", server.uri()))
        .send()
        .await
        .unwrap();

    // The `refuses` scheme has no registered handler, so selection falls
    // through to `exact` regardless of accepts[] ordering.
    assert_eq!(response.status(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_policy_reorders_accepts_before_selection() {
    let server = MockServer::start().await;
    mount_protected_route(
        &server,
        vec![requirements("exact", "5000000"), requirements("cheap", "1000000")],
    )
    .await;

    let exact_signer = CountingSigner::new("exact");
    let exact_calls = exact_signer.calls.clone();
    let cheap_signer = CountingSigner::new("cheap");
    let cheap_calls = cheap_signer.calls.clone();

    let mut registry = ClientSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        "exact",
        2,
        Arc::new(exact_signer) as Arc<_>,
    );
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        "cheap",
        2,
        Arc::new(cheap_signer) as Arc<_>,
    );

    // Prefers the cheapest accept entry, regardless of the order the
    // resource server listed it in.
    let cheapest_first: PaymentPolicy = Arc::new(|_ctx: &RequestContext, mut accepts| {
        accepts.sort_by(|a, b| a.amount.cmp(&b.amount));
        accepts
    });

    let x402_client = X402Client::new(Arc::new(registry)).with_policy(cheapest_first);
    let http_client = Client::new().with_payments(x402_client).build();

    let response = http_client
        .get(format!("{}/protected", server.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(cheap_calls.load(Ordering::SeqCst), 1);
    assert_eq!(exact_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn before_hook_error_aborts_without_signing() {
    let server = MockServer::start().await;
    mount_protected_route(&server, vec![requirements("exact", "1000000")]).await;

    let signer = CountingSigner::new("exact");
    let signer_calls = signer.calls.clone();
    let mut registry = ClientSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        "exact",
        2,
        Arc::new(signer) as Arc<_>,
    );

    let hook_calls = Arc::new(AtomicUsize::new(0));
    let hook_calls_inner = hook_calls.clone();
    let x402_client = X402Client::new(Arc::new(registry)).on_before_payment_creation(Arc::new(
        move |_ctx: &RequestContext| {
            hook_calls_inner.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Err(ClientError::PaymentHookError("budget exceeded".to_string())) })
        },
    ));
    let http_client = Client::new().with_payments(x402_client).build();

    let result = http_client
        .get(format!("{}/protected", server.uri()))
        .send()
        .await;

    assert!(result.is_err());
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    assert_eq!(signer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn after_hook_observes_the_signed_payload_before_retry() {
    let server = MockServer::start().await;
    mount_protected_route(&server, vec![requirements("exact", "1000000")]).await;

    let signer = CountingSigner::new("exact");
    let mut registry = ClientSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        "exact",
        2,
        Arc::new(signer) as Arc<_>,
    );

    let observed_amount = Arc::new(std::sync::Mutex::new(None));
    let observed_amount_inner = observed_amount.clone();
    let x402_client = X402Client::new(Arc::new(registry)).on_after_payment_creation(Arc::new(
        move |_ctx: &RequestContext, payload| {
            *observed_amount_inner.lock().unwrap() = Some(payload.accepted.amount.clone());
            Box::pin(async move { Ok(()) })
        },
    ));
    let http_client = Client::new().with_payments(x402_client).build();

    let response = http_client
        .get(format!("{}/protected", server.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(observed_amount.lock().unwrap().as_deref(), Some("1000000"));
}

#[tokio::test]
async fn no_matching_signer_surfaces_as_a_middleware_error() {
    let server = MockServer::start().await;
    mount_protected_route(&server, vec![requirements("unknown-scheme", "1000000")]).await;

    let registry = ClientSchemeRegistry::new();
    let http_client = Client::new()
        .with_payments(X402Client::new(Arc::new(registry)))
        .build();

    let result = http_client
        .get(format!("{}/protected", server.uri()))
        .send()
        .await;

    assert!(result.is_err());
}

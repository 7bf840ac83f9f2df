//! HTTP endpoints implemented by the x402 **facilitator**.
//!
//! These are the server-side handlers for processing client-submitted x402
//! payments: the protocol-critical `/verify` and `/settle` endpoints, plus
//! discovery endpoints (`/supported`, `/health`, `/`).
//!
//! Routes are generic over any [`FacilitatorClient`], so a process can serve
//! them over [`FacilitatorLocal`](crate::FacilitatorLocal) or over a remote
//! facilitator reached through `x402-facilitator-http`, for integration tests
//! that want to exercise the wire format without a live chain.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, response::IntoResponse};
use serde_json::json;
use tracing::instrument;
use x402_types::facilitator::FacilitatorClient;
use x402_types::proto;

/// `GET /verify`: machine-readable description of the `/verify` endpoint.
#[instrument(skip_all)]
pub async fn get_verify_info() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/verify",
        "description": "POST to verify x402 payments",
        "body": {
            "paymentPayload": "PaymentPayload",
            "paymentRequirements": "PaymentRequirements",
        }
    }))
}

/// `GET /settle`: machine-readable description of the `/settle` endpoint.
#[instrument(skip_all)]
pub async fn get_settle_info() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/settle",
        "description": "POST to settle x402 payments",
        "body": {
            "paymentPayload": "PaymentPayload",
            "paymentRequirements": "PaymentRequirements",
        }
    }))
}

/// Builds the full facilitator route table over a shared `facilitator` state.
pub fn routes<F>(facilitator: F) -> Router
where
    F: FacilitatorClient + Clone + Send + Sync + 'static,
    F::Error: IntoResponse,
{
    Router::new()
        .route("/", get(get_root))
        .route("/verify", get(get_verify_info))
        .route("/verify", post(post_verify::<F>))
        .route("/settle", get(get_settle_info))
        .route("/settle", post(post_settle::<F>))
        .route("/health", get(get_health::<F>))
        .route("/supported", get(get_supported::<F>))
        .with_state(facilitator)
}

/// `GET /`: a simple greeting message from the facilitator.
#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    let pkg_name = env!("CARGO_PKG_NAME");
    (StatusCode::OK, format!("Hello from {pkg_name}!"))
}

/// `GET /supported`: lists the x402 payment schemes and networks this
/// facilitator supports.
#[instrument(skip_all)]
pub async fn get_supported<F>(State(facilitator): State<F>) -> impl IntoResponse
where
    F: FacilitatorClient,
    F::Error: IntoResponse,
{
    match facilitator.supported().await {
        Ok(supported) => (StatusCode::OK, Json(json!(supported))).into_response(),
        Err(error) => error.into_response(),
    }
}

#[instrument(skip_all)]
pub async fn get_health<F>(state: State<F>) -> impl IntoResponse
where
    F: FacilitatorClient,
    F::Error: IntoResponse,
{
    get_supported(state).await
}

/// `POST /verify`: facilitator-side verification of a proposed x402 payment.
#[instrument(skip_all)]
pub async fn post_verify<F>(
    State(facilitator): State<F>,
    Json(body): Json<proto::VerifyRequest>,
) -> impl IntoResponse
where
    F: FacilitatorClient,
    F::Error: IntoResponse,
{
    match facilitator.verify(body.clone()).await {
        Ok(valid_response) => (StatusCode::OK, Json(valid_response)).into_response(),
        Err(error) => {
            tracing::warn!(error = ?error, body = %body.as_str(), "Verification failed");
            error.into_response()
        }
    }
}

/// `POST /settle`: facilitator-side execution of a valid x402 payment on-chain.
#[instrument(skip_all)]
pub async fn post_settle<F>(
    State(facilitator): State<F>,
    Json(body): Json<proto::SettleRequest>,
) -> impl IntoResponse
where
    F: FacilitatorClient,
    F::Error: IntoResponse,
{
    match facilitator.settle(body.clone()).await {
        Ok(valid_response) => (StatusCode::OK, Json(valid_response)).into_response(),
        Err(error) => {
            tracing::warn!(error = ?error, body = %body.as_str(), "Settlement failed");
            error.into_response()
        }
    }
}

//! Minimal paid resource server: a single route priced in USDC on Base
//! Sepolia, gated behind [`x402_axum::X402Gate`] and backed by a remote
//! facilitator over HTTP.

use std::env;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use dotenvy::dotenv;
use x402_axum::facilitator_client::FacilitatorClient;
use x402_axum::{RouteConfig, X402GateBuilder};
use x402_chain_eip155::exact::{Eip155ExactServer, SCHEME_NAME};
use x402_chain_eip155::networks::KnownNetworkEip155;
use x402_scheme::ResourceServerSchemeRegistry;
use x402_types::chain::{ChainId, ChainIdPattern};
use x402_types::networks::USDC;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing();

    let base_sepolia = ChainId::base_sepolia();

    let mut registry = ResourceServerSchemeRegistry::new();
    registry.register(
        ChainIdPattern::from(base_sepolia.clone()),
        SCHEME_NAME,
        2,
        Arc::new(Eip155ExactServer::new(
            base_sepolia.clone(),
            USDC::base_sepolia(),
        )) as Arc<_>,
    );

    let facilitator_url =
        env::var("FACILITATOR_URL").unwrap_or_else(|_| "https://facilitator.x402.rs".to_string());
    let facilitator = FacilitatorClient::try_from(facilitator_url.as_str())?;

    let route: RouteConfig = serde_json::from_value(serde_json::json!({
        "path": "/premium",
        "description": "premium content",
        "accepts": [
            { "network": base_sepolia.to_string(), "price": "$0.01", "payTo": "0xBAc675C310721717Cd4A37F6cbeA1F081b1C2a07" }
        ],
    }))?;

    let gate = X402GateBuilder::new(facilitator, Arc::new(registry))
        .route(route)
        .build();

    let app: Router = Router::new()
        .route("/health", get(health_handler))
        .route("/premium", get(premium_handler))
        .layer(gate);

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn premium_handler() -> impl IntoResponse {
    (StatusCode::OK, "This is a VIP content!")
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

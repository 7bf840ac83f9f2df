//! x402 facilitator server runtime: wires configuration, chain providers,
//! and scheme handlers into a running HTTP server.
//!
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control binding address (or `host`/`port` in the config
//!   file, or `--config`/`CONFIG`)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use tower_http::cors;
#[cfg(not(feature = "telemetry"))]
use tower_http::trace::TraceLayer;
#[cfg(not(feature = "telemetry"))]
use tracing_subscriber::EnvFilter;

use x402_facilitator_local::FacilitatorLocal;
use x402_facilitator_local::handlers;
use x402_facilitator_local::util::SigDown;
#[cfg(feature = "telemetry")]
use x402_facilitator_local::util::Telemetry;

use crate::chain::{self, ChainInitError};
use crate::config::{Config, ConfigError};
use crate::schemes;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Chain(#[from] ChainInitError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Loads configuration, connects to every configured `eip155` chain, and
/// serves the x402 facilitator HTTP API until a shutdown signal arrives.
pub async fn run() -> Result<(), RunError> {
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
        .expect("failed to install rustls crypto provider");
    dotenvy::dotenv().ok();

    #[cfg(feature = "telemetry")]
    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();
    #[cfg(not(feature = "telemetry"))]
    init_tracing();

    let config = Config::load()?;
    let chain_registry = chain::build_chain_registry(&config).await?;
    let scheme_registry = schemes::build_registry(&chain_registry, &config.schemes);
    let facilitator = Arc::new(FacilitatorLocal::new(scheme_registry));

    let app: Router = Router::new().merge(handlers::routes(facilitator));
    #[cfg(feature = "telemetry")]
    let app = app.layer(telemetry.http_tracing());
    #[cfg(not(feature = "telemetry"))]
    let app = app.layer(TraceLayer::new_for_http());
    let app = app.layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| RunError::Bind { addr, source })?;
    tracing::info!(%addr, "x402 facilitator listening");

    let sig_down = SigDown::try_new().map_err(RunError::Serve)?;
    let cancellation_token = sig_down.cancellation_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await
        .map_err(RunError::Serve)
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Axum integration for the x402 payment-negotiation protocol.
//!
//! [`X402Gate`] is a [`tower::Layer`] wrapping an entire [`axum::Router`]
//! (not a single route): requests are matched against a configured route
//! table, and only matched requests are driven through the gate pipeline
//! (price resolution, requirements synthesis, 402 emission, verify,
//! downstream invocation, settle). Unmatched requests pass through
//! untouched.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use axum::{Router, routing::get};
//! use axum::response::IntoResponse;
//! use http::StatusCode;
//! use x402_axum::{X402GateBuilder, RouteConfig};
//!
//! let registry = Arc::new(build_resource_server_registry());
//! let facilitator = build_facilitator_client();
//!
//! let route: RouteConfig = serde_json::from_value(serde_json::json!({
//!     "path": "/premium",
//!     "description": "premium content",
//!     "accepts": [
//!         { "network": "eip155:8453", "price": "$0.01", "payTo": "0xabc..." }
//!     ],
//! })).unwrap();
//!
//! let gate = X402GateBuilder::new(facilitator, registry)
//!     .route(route)
//!     .build();
//!
//! let app: Router = Router::new()
//!     .route("/premium", get(|| async { (StatusCode::OK, "VIP content") }))
//!     .layer(gate);
//! ```
//!
//! # Modules
//!
//! - [`paygate`] — the per-request verify/settle state machine
//! - [`layer`] — the route-table-driven `tower::Layer`
//! - [`route`] — `(method, pattern)` matching with `*`/`**` wildcards
//! - [`route_config`] — JSON-deserializable route definitions
//! - [`facilitator_client`] — HTTP-stub [`x402_types::facilitator::FacilitatorClient`]

pub mod facilitator_client;
pub mod layer;
pub mod paygate;
pub mod route;
pub mod route_config;

pub use facilitator_client::FacilitatorClient;
pub use layer::{X402Gate, X402GateBuilder, X402GateService};
pub use paygate::{AcceptSpec, Paygate, PaygateError};
pub use route::RouteKey;
pub use route_config::{AcceptConfig, RouteConfig};

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Local facilitator implementation for the x402 payment protocol.
//!
//! This crate provides [`FacilitatorLocal`], a
//! [`FacilitatorClient`](x402_types::facilitator::FacilitatorClient)
//! implementation that validates x402 payment payloads and performs on-chain
//! settlements using registered scheme handlers.
//!
//! # Architecture
//!
//! A facilitator process builds a [`FacilitatorSchemeRegistry`](x402_scheme::FacilitatorSchemeRegistry)
//! by registering one handler per (chain pattern, scheme, version) triple it
//! supports, then wraps it in a [`FacilitatorLocal`]. Wire `/verify` and
//! `/settle` requests resolve to a handler by the scheme handler slug carried
//! in the request's `paymentPayload`; unresolved slugs surface as
//! `UnsupportedScheme`.
//!
//! # Modules
//!
//! - [`facilitator_local`] - Core facilitator implementation
//! - [`handlers`] - HTTP endpoints for the x402 protocol
//! - [`util`] - Utilities for graceful shutdown and telemetry
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use x402_facilitator_local::{FacilitatorLocal, handlers};
//! use x402_scheme::FacilitatorSchemeRegistry;
//! use x402_chain_eip155::exact::Eip155ExactFacilitator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(build_eip155_provider().await?);
//!     let mut registry = FacilitatorSchemeRegistry::new();
//!     registry.register(
//!         "eip155:*".parse()?,
//!         "exact",
//!         2,
//!         Arc::new(Eip155ExactFacilitator::new(provider)),
//!     );
//!
//!     let facilitator = Arc::new(FacilitatorLocal::new(registry));
//!
//!     let app = axum::Router::new().merge(handlers::routes(facilitator));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod facilitator_local;
pub mod handlers;
pub mod util;

pub use facilitator_local::*;
pub use handlers::*;

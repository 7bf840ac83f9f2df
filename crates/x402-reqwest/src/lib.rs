#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! `reqwest` integration for the x402 payment-negotiation protocol.
//!
//! [`X402Client`] is the client-role `ClientCore`: it holds a registry of
//! signer handlers (one per `(network, scheme)`), a chain of selection
//! policies, and before/after observer hooks, and knows how to turn a `402`
//! response into a signed payment payload. Wrapped as a
//! [`reqwest_middleware::Middleware`] via [`ReqwestWithPayments`], it
//! transparently retries a paid request exactly once.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reqwest::Client;
//! use x402_reqwest::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
//! use x402_scheme::ClientSchemeRegistry;
//!
//! let registry = Arc::new(ClientSchemeRegistry::new()); // populated by a chain crate
//! let client = Client::new()
//!     .with_payments(X402Client::new(registry))
//!     .build();
//! ```

pub mod builder;
pub mod client;

pub use builder::*;
pub use client::{
    AfterPaymentHook, BeforePaymentHook, ClientError, PaymentPolicy, RequestContext, X402Client,
    settlement_receipt,
};

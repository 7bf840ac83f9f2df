#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Scheme handler contracts for the x402 payment protocol.
//!
//! A scheme handler implements one of three roles against a concrete chain
//! and scheme name (e.g. `exact` on `eip155`). The three roles have
//! disjoint method sets and are registered independently — a process may run
//! only the client role, only the facilitator role, or (for integration
//! tests) all three at once.
//!
//! This crate defines the role traits and the type aliases wiring them to
//! [`x402_types::scheme::SchemeRegistry`]. Concrete per-chain handlers (e.g.
//! `x402-chain-eip155`) depend on this crate; this crate has no knowledge of
//! any specific blockchain.

pub mod price;

use std::sync::Arc;

use x402_types::chain::ChainId;
use x402_types::proto::v2::{PaymentRequirements, ResourceInfo};
use x402_types::proto::{
    AsPaymentProblem, ErrorReason, PaymentProblem, SettleResponse, SupportedPaymentKind,
    VerifyResponse,
};
use x402_types::scheme::SchemeRegistry;

pub use price::{AssetAmount, PriceSpec};

/// An opaque, scheme-handler-level failure.
///
/// Role traits report errors through this type rather than an associated
/// type so that `Arc<dyn ClientSchemeHandler>` etc. stay object-safe and the
/// three registries can hold handlers from different chain crates side by
/// side. Concrete handlers convert their own error enums into this via `?`
/// (`#[from]`) or `SchemeHandlerError::other`.
#[derive(Debug, thiserror::Error)]
pub enum SchemeHandlerError {
    #[error("payload rejected: {0}")]
    Rejected(String),
    #[error("upstream RPC failure: {0}")]
    Rpc(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl SchemeHandlerError {
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }

    /// `true` if this failure is a client-caused rejection (HTTP 400 territory)
    /// rather than an upstream/infrastructure fault (HTTP 500 territory).
    pub fn is_client_fault(&self) -> bool {
        matches!(self, SchemeHandlerError::Rejected(_))
    }
}

impl AsPaymentProblem for SchemeHandlerError {
    fn as_payment_problem(&self) -> PaymentProblem {
        let reason = match self {
            SchemeHandlerError::Rejected(_) => ErrorReason::InvalidPayload,
            SchemeHandlerError::Rpc(_) => ErrorReason::UnexpectedError,
            SchemeHandlerError::Other(_) => ErrorReason::UnexpectedError,
        };
        PaymentProblem::new(reason, self.to_string())
    }
}

/// A client-role scheme handler: produces signed payment payloads.
///
/// Implementations may perform RPC reads (e.g. fetch a nonce or token
/// decimals) but MUST NOT mutate on-chain state.
#[async_trait::async_trait]
pub trait ClientSchemeHandler: Send + Sync {
    /// Signs a payment authorization for `requirements`, to be submitted
    /// against `resource_url`.
    async fn sign(
        &self,
        requirements: &PaymentRequirements,
        resource_url: &str,
    ) -> Result<serde_json::Value, SchemeHandlerError>;

    /// Optionally adjusts requirements before signing (e.g. filling in a fee
    /// payer address learned from the facilitator's `/supported` response).
    fn enrich_requirements(&self, requirements: PaymentRequirements) -> PaymentRequirements {
        requirements
    }
}

/// A resource-server-role scheme handler: turns route configuration into
/// concrete payment requirements.
pub trait ResourceServerSchemeHandler: Send + Sync {
    /// Resolves a route's configured price into an on-chain asset amount.
    fn parse_price(
        &self,
        price: &PriceSpec,
        network: &ChainId,
    ) -> Result<AssetAmount, SchemeHandlerError>;

    /// Folds declared extensions and any facilitator-reported capability
    /// hints (e.g. a `feePayer`) into outgoing requirements.
    fn enhance_payment_requirements(
        &self,
        requirements: PaymentRequirements,
        supported_kind: Option<&SupportedPaymentKind>,
        extension_keys: &[String],
    ) -> PaymentRequirements {
        let _ = (supported_kind, extension_keys);
        requirements
    }
}

/// A facilitator-role scheme handler: verifies and settles payments on chain.
#[async_trait::async_trait]
pub trait FacilitatorSchemeHandler: Send + Sync {
    /// Read-only verification of a signed payload against requirements.
    async fn verify(
        &self,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, SchemeHandlerError>;

    /// Broadcasts and waits for inclusion of the on-chain settlement
    /// transaction.
    async fn settle(
        &self,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, SchemeHandlerError>;
}

/// A resource description attached to outgoing payment requirements.
pub fn resource_info(
    url: impl Into<String>,
    description: impl Into<String>,
    mime_type: impl Into<String>,
) -> ResourceInfo {
    ResourceInfo {
        url: url.into(),
        description: description.into(),
        mime_type: mime_type.into(),
    }
}

/// Client-role registry: `Arc<dyn ClientSchemeHandler>` keyed by network pattern + scheme.
pub type ClientSchemeRegistry = SchemeRegistry<Arc<dyn ClientSchemeHandler>>;

/// Resource-server-role registry.
pub type ResourceServerSchemeRegistry = SchemeRegistry<Arc<dyn ResourceServerSchemeHandler>>;

/// Facilitator-role registry.
pub type FacilitatorSchemeRegistry = SchemeRegistry<Arc<dyn FacilitatorSchemeHandler>>;

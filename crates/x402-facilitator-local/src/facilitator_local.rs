//! Local facilitator implementation for x402 payments.
//!
//! [`FacilitatorLocal`] implements [`FacilitatorClient`] by dispatching
//! verify/settle calls to a facilitator-role [`FacilitatorSchemeRegistry`],
//! resolved by the chain ID, scheme name, and protocol version carried on
//! the wire request.
//!
//! # Example
//!
//! ```ignore
//! use x402_facilitator_local::FacilitatorLocal;
//! use x402_scheme::FacilitatorSchemeRegistry;
//!
//! let registry: FacilitatorSchemeRegistry = build_registry();
//! let facilitator = FacilitatorLocal::new(registry);
//! let response = facilitator.verify(request).await?;
//! ```

use std::collections::HashMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use x402_scheme::FacilitatorSchemeRegistry;
use x402_types::facilitator::FacilitatorClient;
use x402_types::proto;
use x402_types::proto::v2;
use x402_types::proto::v2::PaymentRequirements;
use x402_types::proto::{AsPaymentProblem, ErrorReason, PaymentVerificationError, SupportedResponse};

/// A local [`FacilitatorClient`] implementation that delegates to scheme handlers.
pub struct FacilitatorLocal {
    handlers: FacilitatorSchemeRegistry,
}

impl FacilitatorLocal {
    pub fn new(handlers: FacilitatorSchemeRegistry) -> Self {
        FacilitatorLocal { handlers }
    }

    fn resolve(
        &self,
        request: &proto::VerifyRequest,
    ) -> Result<
        (
            std::sync::Arc<dyn x402_scheme::FacilitatorSchemeHandler>,
            serde_json::Value,
            PaymentRequirements,
        ),
        FacilitatorLocalError,
    > {
        let slug = request
            .scheme_handler_slug()
            .ok_or(FacilitatorLocalError::Verification(
                PaymentVerificationError::InvalidFormat("could not resolve scheme handler slug".into()),
            ))?;
        let handler = self
            .handlers
            .resolve(&slug.chain_id, &slug.name, slug.x402_version)
            .cloned()
            .ok_or(FacilitatorLocalError::Verification(
                PaymentVerificationError::UnsupportedScheme,
            ))?;
        let parsed: v2::VerifyRequest<serde_json::Value, PaymentRequirements> =
            serde_json::from_str(request.as_str()).map_err(|e| {
                FacilitatorLocalError::Verification(PaymentVerificationError::InvalidFormat(
                    e.to_string(),
                ))
            })?;
        Ok((handler, parsed.payment_payload, parsed.payment_requirements))
    }
}

impl FacilitatorClient for FacilitatorLocal {
    type Error = FacilitatorLocalError;

    async fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> Result<proto::VerifyResponse, Self::Error> {
        let (handler, payload, requirements) = self.resolve(&request)?;
        handler
            .verify(&payload, &requirements)
            .await
            .map_err(FacilitatorLocalError::SchemeVerification)
    }

    async fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> Result<proto::SettleResponse, Self::Error> {
        let (handler, payload, requirements) = self.resolve(&request)?;
        handler
            .settle(&payload, &requirements)
            .await
            .map_err(FacilitatorLocalError::SchemeSettlement)
    }

    async fn supported(&self) -> Result<SupportedResponse, Self::Error> {
        let mut kinds = Vec::new();
        let signers = HashMap::new();
        for (pattern, scheme, version) in self.handlers.entries() {
            kinds.push(proto::SupportedPaymentKind {
                x402_version: version,
                scheme: scheme.to_string(),
                network: pattern.to_string(),
                extra: None,
            });
        }
        Ok(SupportedResponse {
            kinds,
            extensions: Vec::new(),
            signers,
        })
    }
}

/// Errors that can occur during local facilitator operations.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorLocalError {
    /// The wire request could not be routed to any registered scheme handler.
    #[error(transparent)]
    Verification(PaymentVerificationError),
    /// The resolved scheme handler rejected the payload during verify.
    #[error("verification failed: {0}")]
    SchemeVerification(x402_scheme::SchemeHandlerError),
    /// The resolved scheme handler failed during settle.
    #[error("settlement failed: {0}")]
    SchemeSettlement(x402_scheme::SchemeHandlerError),
}

impl AsPaymentProblem for FacilitatorLocalError {
    fn as_payment_problem(&self) -> proto::PaymentProblem {
        match self {
            FacilitatorLocalError::Verification(e) => e.as_payment_problem(),
            FacilitatorLocalError::SchemeVerification(e) => e.as_payment_problem(),
            FacilitatorLocalError::SchemeSettlement(e) => e.as_payment_problem(),
        }
    }
}

impl IntoResponse for FacilitatorLocalError {
    fn into_response(self) -> axum::response::Response {
        let problem = self.as_payment_problem();
        let status = match problem.reason() {
            ErrorReason::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(json!({
                "errorReason": problem.reason(),
                "details": problem.details(),
            })),
        )
            .into_response()
    }
}

//! Core payment gate: route-level price resolution, requirements synthesis,
//! and the verify/settle state machine around a downstream Axum handler.
//!
//! This implements the per-request lifecycle: route match happens one level
//! up (an Axum route is only reached once matched), then price resolution,
//! requirements synthesis, payload decoding, facilitator verify, downstream
//! invocation, and a fair-billing settle decision (no settlement is
//! attempted if the downstream handler itself failed).

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tower::Service;
use url::Url;

use x402_scheme::{PriceSpec, ResourceServerSchemeHandler, ResourceServerSchemeRegistry};
use x402_types::chain::ChainId;
use x402_types::facilitator::FacilitatorClient;
use x402_types::proto::v2::{self, ExtensionDescriptor, PaymentRequired, PaymentRequirements, ResourceInfo};
use x402_types::proto::{self, SettleOutcome, SupportedResponse, VerifyOutcome};
use x402_types::util::Base64Bytes;

#[cfg(feature = "telemetry")]
use tracing::Instrument;

/// The header a client attaches a signed payment payload under.
pub const PAYMENT_HEADER_NAME: &str = "X-PAYMENT";
/// The header the gate attaches the settlement receipt under, on success.
pub const PAYMENT_RESPONSE_HEADER_NAME: &str = "X-PAYMENT-RESPONSE";

/// The scheme-specific signed payload shape accepted on the wire: the
/// requirements the client claims to have accepted, plus an opaque
/// scheme-specific payload value.
pub type PaymentPayload = v2::PaymentPayload<PaymentRequirements, serde_json::Value>;

/// One payment method a protected route is willing to accept, as configured
/// by the resource server operator, before price resolution.
#[derive(Debug, Clone)]
pub struct AcceptSpec {
    pub network: ChainId,
    pub scheme: String,
    pub price: PriceSpec,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
}

impl AcceptSpec {
    pub fn new(
        network: ChainId,
        scheme: impl Into<String>,
        price: PriceSpec,
        pay_to: impl Into<String>,
    ) -> Self {
        Self {
            network,
            scheme: scheme.into(),
            price,
            pay_to: pay_to.into(),
            max_timeout_seconds: 300,
        }
    }

    /// Overrides the default 300-second settlement timeout.
    pub fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }
}

/// Builder for the [`ResourceInfo`] attached to every 402 and verify/settle
/// request for a route.
#[derive(Debug, Clone)]
pub struct ResourceInfoBuilder {
    pub description: String,
    pub mime_type: String,
    pub url: Option<String>,
}

impl Default for ResourceInfoBuilder {
    fn default() -> Self {
        Self {
            description: String::new(),
            mime_type: "application/json".to_string(),
            url: None,
        }
    }
}

impl ResourceInfoBuilder {
    /// Resolves the resource URL: explicit `url` wins, otherwise combines
    /// `base_url` (or the request's `Host` header) with the request's path
    /// and query.
    pub fn as_resource_info(&self, base_url: Option<&Url>, req: &Request) -> ResourceInfo {
        let url = self.url.clone().unwrap_or_else(|| {
            let mut url = base_url.cloned().unwrap_or_else(|| {
                let host = req
                    .headers()
                    .get("host")
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or("localhost");
                let origin = format!("http://{host}");
                Url::parse(&origin).unwrap_or_else(|_| Url::parse("http://localhost").unwrap())
            });
            let request_uri = req.uri();
            url.set_path(request_uri.path());
            url.set_query(request_uri.query());
            url.to_string()
        });
        ResourceInfo {
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            url,
        }
    }
}

/// Errors raised while driving a request through the gate. Every variant
/// maps to a `402 Payment Required` response (except [`PaygateError::UnresolvedScheme`]
/// and [`PaygateError::PriceResolution`], which are route misconfiguration and map to
/// `500 internal_error` per the core's "unexpected exception" propagation policy);
/// the downstream handler's own errors are returned to the caller unchanged and never
/// become one of these.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    #[error("{0} header is required")]
    PaymentHeaderRequired(&'static str),
    #[error("duplicate {0} header")]
    DuplicatePaymentHeader(&'static str),
    #[error("invalid or malformed payment header")]
    InvalidPayload,
    #[error("unable to find matching payment requirements")]
    NoMatchingRequirement,
    #[error("{0}")]
    VerificationInvalid(String),
    #[error("facilitator_unreachable: {0}")]
    FacilitatorUnreachable(String),
    #[error("{0}")]
    SettlementFailed(String),
    #[error("settlement_failed: {0}")]
    SettlementTransportFailure(String),
    #[error("extension {extension} failed validation: {reason}")]
    ExtensionValidation { extension: String, reason: String },
    #[error("no scheme handler registered for {network}/{scheme}")]
    UnresolvedScheme { network: String, scheme: String },
    #[error("failed to resolve price: {0}")]
    PriceResolution(#[from] x402_scheme::SchemeHandlerError),
}

impl PaygateError {
    /// `true` if this is an unexpected core exception (route misconfiguration)
    /// rather than an ordinary per-request payment failure. These map to
    /// `500 internal_error` instead of `402`, and never attempt settlement.
    fn is_internal(&self) -> bool {
        matches!(
            self,
            PaygateError::UnresolvedScheme { .. } | PaygateError::PriceResolution(_)
        )
    }

    /// The wire-visible `error` field on the 402 body. `None` for the
    /// missing-header case, which responds with `{accepts, resource}` only.
    fn wire_error(&self) -> Option<String> {
        match self {
            PaygateError::PaymentHeaderRequired(_) => None,
            PaygateError::DuplicatePaymentHeader(_) => Some("invalid_payload".to_string()),
            PaygateError::InvalidPayload => Some("invalid_payload".to_string()),
            PaygateError::NoMatchingRequirement => Some("no_matching_requirement".to_string()),
            PaygateError::VerificationInvalid(reason) => Some(reason.clone()),
            PaygateError::FacilitatorUnreachable(_) => Some("facilitator_unreachable".to_string()),
            PaygateError::SettlementFailed(reason) => Some(reason.clone()),
            PaygateError::SettlementTransportFailure(_) => Some("settlement_failed".to_string()),
            PaygateError::ExtensionValidation { .. } => Some("invalid_payload".to_string()),
            PaygateError::UnresolvedScheme { .. } => Some("unsupported_scheme".to_string()),
            PaygateError::PriceResolution(_) => Some("internal_error".to_string()),
        }
    }
}

/// Resolves a route's configured `accepts[]` into wire-ready payment
/// requirements: price resolution against the resource-server-role scheme
/// registry, then `enhancePaymentRequirements` to fold in facilitator
/// capability hints.
pub fn synthesize_requirements(
    registry: &ResourceServerSchemeRegistry,
    accepts: &[AcceptSpec],
    resource: &ResourceInfo,
    supported: Option<&SupportedResponse>,
    extensions: &HashMap<String, ExtensionDescriptor>,
) -> Result<Vec<PaymentRequirements>, PaygateError> {
    let extension_keys: Vec<String> = extensions.keys().cloned().collect();
    let declared_extensions = if extensions.is_empty() {
        None
    } else {
        Some(extensions.clone())
    };
    accepts
        .iter()
        .map(|accept| {
            let handler = registry
                .resolve(&accept.network, &accept.scheme, v2::X402Version2::VALUE)
                .ok_or_else(|| PaygateError::UnresolvedScheme {
                    network: accept.network.to_string(),
                    scheme: accept.scheme.clone(),
                })?;
            let asset_amount = handler.parse_price(&accept.price, &accept.network)?;
            let requirements = PaymentRequirements {
                scheme: accept.scheme.clone(),
                network: accept.network.clone(),
                amount: asset_amount.amount,
                pay_to: accept.pay_to.clone(),
                max_timeout_seconds: accept.max_timeout_seconds,
                asset: asset_amount.asset,
                extra: asset_amount.extra,
                resource: Some(resource.clone()),
                extensions: declared_extensions.clone(),
            };
            let supported_kind = supported.and_then(|s| {
                s.kinds
                    .iter()
                    .find(|k| k.network == accept.network.to_string() && k.scheme == accept.scheme)
            });
            Ok(handler.enhance_payment_requirements(requirements, supported_kind, &extension_keys))
        })
        .collect()
}

/// A per-extension server-side validation hook, invoked with the decoded
/// payload's per-extension data after verify succeeds and before settle is
/// called. An `Err` aborts the flow with [`PaygateError::ExtensionValidation`].
pub type ExtensionValidator = Arc<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// Drives one request through the full verify/settle lifecycle for a
/// protected route.
pub struct Paygate<TFacilitator> {
    pub facilitator: TFacilitator,
    pub registry: Arc<ResourceServerSchemeRegistry>,
    pub accepts: Arc<Vec<AcceptSpec>>,
    pub resource: ResourceInfo,
    /// Extensions declared for this route, advertised on every synthesized
    /// [`PaymentRequirements`].
    pub extensions: Arc<HashMap<String, ExtensionDescriptor>>,
    /// Declared extension validators for this route, keyed by extension id.
    pub extension_hooks: Arc<HashMap<String, ExtensionValidator>>,
}

impl<TFacilitator> Paygate<TFacilitator> {
    async fn call_inner<
        ReqBody,
        ResBody,
        S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    >(
        mut inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<http::Response<ResBody>, S::Error>
    where
        S::Future: Send,
    {
        #[cfg(feature = "telemetry")]
        {
            inner
                .call(req)
                .instrument(tracing::info_span!("inner"))
                .await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            inner.call(req).await
        }
    }
}

impl<TFacilitator> Paygate<TFacilitator>
where
    TFacilitator: FacilitatorClient + Send + Sync,
{
    /// Handles a request, turning any gate failure into a `402` response
    /// rather than propagating it.
    pub async fn handle_request<
        ReqBody,
        ResBody,
        S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    >(
        self,
        inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<Response, std::convert::Infallible>
    where
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        match self.handle_request_fallible(inner, req).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_internal() => {
                tracing_error(&err);
                Ok(internal_error_response())
            }
            Err(err) => Ok(self.error_response(err).await),
        }
    }

    async fn requirements(&self) -> Result<Vec<PaymentRequirements>, PaygateError> {
        let supported = self.facilitator.supported().await.ok();
        synthesize_requirements(
            &self.registry,
            &self.accepts,
            &self.resource,
            supported.as_ref(),
            &self.extensions,
        )
    }

    /// Runs every declared extension's validation hook against the decoded
    /// payload's per-extension data. Invoked after verify succeeds and
    /// before settle is attempted; any failure aborts settlement.
    fn validate_extensions(&self, payload: &PaymentPayload) -> Result<(), PaygateError> {
        if self.extension_hooks.is_empty() {
            return Ok(());
        }
        let payload_extensions = payload.extensions.as_ref();
        for (id, hook) in self.extension_hooks.iter() {
            let value = payload_extensions
                .and_then(|ext| ext.get(id))
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            hook(&value).map_err(|reason| PaygateError::ExtensionValidation {
                extension: id.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    async fn error_response(&self, err: PaygateError) -> Response {
        let accepts = self.requirements().await.unwrap_or_default();
        let payment_required = PaymentRequired {
            x402_version: v2::X402Version2,
            error: err.wire_error(),
            resource: self.resource.clone(),
            accepts,
        };
        let body = serde_json::to_vec(&payment_required).expect("serialization failed");
        Response::builder()
            .status(StatusCode::PAYMENT_REQUIRED)
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .expect("failed to construct response")
    }

    /// The fallible core of [`Self::handle_request`]: steps 2–9 of the gate
    /// pipeline (route matching already happened by virtue of this gate
    /// being reached).
    pub async fn handle_request_fallible<
        ReqBody,
        ResBody,
        S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    >(
        &self,
        inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<Response, PaygateError>
    where
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        let accepts = self.requirements().await?;

        let mut req = req;
        let mut payment_headers = req.headers().get_all(PAYMENT_HEADER_NAME).iter();
        let header_value = payment_headers
            .next()
            .ok_or(PaygateError::PaymentHeaderRequired(PAYMENT_HEADER_NAME))?;
        if payment_headers.next().is_some() {
            return Err(PaygateError::DuplicatePaymentHeader(PAYMENT_HEADER_NAME));
        }
        let header_bytes = header_value.as_bytes().to_vec();
        let payload =
            decode_payment_payload(&header_bytes).ok_or(PaygateError::InvalidPayload)?;
        // The downstream handler must not observe the payment header; the
        // gate has already consumed it.
        req.headers_mut().remove(PAYMENT_HEADER_NAME);

        let matched = accepts
            .iter()
            .find(|requirement| {
                requirement.scheme == payload.accepted.scheme
                    && requirement.network == payload.accepted.network
                    && requirement.asset == payload.accepted.asset
                    && requirement.pay_to == payload.accepted.pay_to
            })
            .ok_or(PaygateError::NoMatchingRequirement)?;

        let verify_request = build_verify_request(&payload, matched)?;

        let verify_response = self
            .facilitator
            .verify(verify_request.clone())
            .await
            .map_err(|e| PaygateError::FacilitatorUnreachable(e.to_string()))?;
        let verify_outcome = VerifyOutcome::try_from(verify_response)
            .map_err(|e| PaygateError::VerificationInvalid(e.to_string()))?;
        if let VerifyOutcome::Invalid { reason, .. } = verify_outcome {
            return Err(PaygateError::VerificationInvalid(reason));
        }

        self.validate_extensions(&payload)?;

        // Downstream execution.
        let downstream_response = match Self::call_inner(inner, req).await {
            Ok(response) => response.into_response(),
            Err(err) => return Ok(err.into_response()),
        };

        if downstream_response.status().is_client_error()
            || downstream_response.status().is_server_error()
        {
            // Fair billing: no charge for a server-side failure.
            return Ok(downstream_response);
        }

        let settle_response = self
            .facilitator
            .settle(verify_request)
            .await
            .map_err(|e| PaygateError::SettlementTransportFailure(e.to_string()))?;
        let header_value = settlement_header(&settle_response)?;
        let settle_outcome = SettleOutcome::try_from(settle_response)
            .map_err(|e| PaygateError::SettlementFailed(e.to_string()))?;

        match settle_outcome {
            SettleOutcome::Success { .. } => {
                let mut response = downstream_response;
                response
                    .headers_mut()
                    .insert(PAYMENT_RESPONSE_HEADER_NAME, header_value);
                Ok(response)
            }
            SettleOutcome::Error { reason, .. } => {
                // Overwrite with 402, but still attach the failed settle
                // receipt for diagnostics.
                let mut response = self.error_response(PaygateError::SettlementFailed(reason)).await;
                response
                    .headers_mut()
                    .insert(PAYMENT_RESPONSE_HEADER_NAME, header_value);
                Ok(response)
            }
        }
    }
}

fn tracing_error(err: &PaygateError) {
    #[cfg(feature = "telemetry")]
    tracing::error!(error = %err, "unexpected paygate failure");
    #[cfg(not(feature = "telemetry"))]
    let _ = err;
}

/// `500 internal_error`, for unexpected core exceptions (route
/// misconfiguration) that must never attempt settlement.
fn internal_error_response() -> Response {
    let body = serde_json::to_vec(&serde_json::json!({ "error": "internal_error" }))
        .expect("serialization failed");
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .expect("failed to construct response")
}

fn decode_payment_payload(header_bytes: &[u8]) -> Option<PaymentPayload> {
    let decoded = Base64Bytes::from(header_bytes).decode().ok()?;
    serde_json::from_slice(&decoded).ok()
}

fn build_verify_request(
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
) -> Result<proto::VerifyRequest, PaygateError> {
    let verify_request = v2::VerifyRequest {
        x402_version: v2::X402Version2,
        payment_payload: payload.clone(),
        payment_requirements: requirements.clone(),
    };
    let raw = serde_json::to_value(&verify_request)
        .and_then(|value| serde_json::value::to_raw_value(&value))
        .map_err(|e| PaygateError::VerificationInvalid(e.to_string()))?;
    Ok(proto::VerifyRequest::from(raw))
}

fn settlement_header(settlement: &proto::SettleResponse) -> Result<HeaderValue, PaygateError> {
    let json = serde_json::to_vec(settlement)
        .map_err(|e| PaygateError::SettlementFailed(e.to_string()))?;
    let encoded = Base64Bytes::encode(json);
    HeaderValue::from_bytes(encoded.as_ref())
        .map_err(|e| PaygateError::SettlementFailed(e.to_string()))
}

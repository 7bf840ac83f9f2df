//! Client-side x402 payment handling for reqwest.
//!
//! [`X402Client`] is the `ClientCore` of the protocol: it holds a registry of
//! signer handlers, a chain of selection policies, and observer hooks, and
//! knows how to turn a `402` response into a signed [`PaymentPayload`]. The
//! [`reqwest_middleware::Middleware`] impl below is the thin HTTP-retry shell
//! around it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{Extensions, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;

use x402_scheme::{ClientSchemeHandler, ClientSchemeRegistry};
use x402_types::chain::ChainId;
use x402_types::proto::{self, SettleResponse};
use x402_types::proto::v2::{self, PaymentRequired, PaymentRequirements};
use x402_types::util::Base64Bytes;

#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, trace};

/// The header a client attaches a signed payment payload under.
pub const PAYMENT_HEADER_NAME: &str = "X-PAYMENT";
/// The header a resource server attaches the settlement receipt under.
pub const PAYMENT_RESPONSE_HEADER_NAME: &str = "X-PAYMENT-RESPONSE";

/// The wire payload a client emits: the requirements it accepted plus the
/// scheme-specific signed value.
pub type PaymentPayload = v2::PaymentPayload<PaymentRequirements, serde_json::Value>;

/// Context visible to policies and hooks for one payment decision.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub resource_url: String,
    pub method: http::Method,
}

/// A selection policy: `(context, accepts) -> accepts`, possibly reordered
/// or filtered. Registered policies compose in registration order — the
/// last one registered sees every earlier policy's output and is therefore
/// the outermost.
pub type PaymentPolicy =
    Arc<dyn Fn(&RequestContext, Vec<PaymentRequirements>) -> Vec<PaymentRequirements> + Send + Sync>;

type HookFuture = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send>>;

/// Fired before a signer is invoked. An `Err` aborts payment creation.
pub type BeforePaymentHook = Arc<dyn Fn(&RequestContext) -> HookFuture + Send + Sync>;
/// Fired after a payload has been signed, before it is attached to the retry.
pub type AfterPaymentHook =
    Arc<dyn Fn(&RequestContext, &PaymentPayload) -> HookFuture + Send + Sync>;

/// Errors raised while turning a `402` into a retried, paid request.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("response body is not a valid PaymentRequired document")]
    MalformedPaymentRequired,
    #[error("no registered signer matches any accepted payment method")]
    NoMatchingSigner,
    #[error(transparent)]
    SchemeHandler(#[from] x402_scheme::SchemeHandlerError),
    #[error("payment_hook_error: {0}")]
    PaymentHookError(String),
    #[error("request could not be cloned for retry")]
    RequestNotCloneable,
    #[error("failed to encode payment payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Orchestrates the client half of the protocol: policy-based selection of
/// one `accepts[]` entry, dispatch to its registered signer, and the
/// before/after observer hooks around signing.
pub struct X402Client {
    registry: Arc<ClientSchemeRegistry>,
    policies: Vec<PaymentPolicy>,
    before_hooks: Vec<BeforePaymentHook>,
    after_hooks: Vec<AfterPaymentHook>,
}

impl X402Client {
    /// Builds a client around a registry of signer handlers. The registry is
    /// assembled once at startup, the same way a resource server's or
    /// facilitator's scheme registry is.
    pub fn new(registry: Arc<ClientSchemeRegistry>) -> Self {
        Self {
            registry,
            policies: Vec::new(),
            before_hooks: Vec::new(),
            after_hooks: Vec::new(),
        }
    }

    /// Registers a selection policy. See [`PaymentPolicy`] for composition order.
    pub fn with_policy(mut self, policy: PaymentPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Registers an observer hook run before the signer is invoked.
    pub fn on_before_payment_creation(mut self, hook: BeforePaymentHook) -> Self {
        self.before_hooks.push(hook);
        self
    }

    /// Registers an observer hook run after the signer returns, before the
    /// payload is attached to the retried request.
    pub fn on_after_payment_creation(mut self, hook: AfterPaymentHook) -> Self {
        self.after_hooks.push(hook);
        self
    }

    /// Resolves `network`/`scheme` to a registered signer, if any.
    fn resolve(&self, network: &ChainId, scheme: &str) -> Option<&Arc<dyn ClientSchemeHandler>> {
        self.registry.resolve(network, scheme, v2::X402Version2::VALUE)
    }

    /// Runs registered policies (in registration order, so the last one is
    /// outermost), then picks the first entry whose `(scheme, network)`
    /// resolves to a registered signer. Ties inside one policy's output are
    /// broken by that policy's own ordering.
    fn select(
        &self,
        ctx: &RequestContext,
        accepts: Vec<PaymentRequirements>,
    ) -> Option<(PaymentRequirements, Arc<dyn ClientSchemeHandler>)> {
        let ordered = self
            .policies
            .iter()
            .fold(accepts, |acc, policy| policy(ctx, acc));
        ordered.into_iter().find_map(|requirements| {
            self.resolve(&requirements.network, &requirements.scheme)
                .cloned()
                .map(|handler| (requirements, handler))
        })
    }

    /// Selects a payment method, signs it, and runs the before/after hooks.
    /// Does not perform any HTTP itself.
    pub async fn create_payment_payload(
        &self,
        payment_required: &PaymentRequired,
        ctx: &RequestContext,
    ) -> Result<PaymentPayload, ClientError> {
        let (requirements, handler) = self
            .select(ctx, payment_required.accepts.clone())
            .ok_or(ClientError::NoMatchingSigner)?;
        let enriched = handler.enrich_requirements(requirements);

        for hook in &self.before_hooks {
            hook(ctx)
                .await
                .map_err(|e| ClientError::PaymentHookError(e.to_string()))?;
        }

        let signed = handler.sign(&enriched, &ctx.resource_url).await?;

        let payload = v2::PaymentPayload {
            accepted: enriched,
            payload: signed,
            resource: None,
            extensions: None,
            x402_version: v2::X402Version2,
        };

        for hook in &self.after_hooks {
            hook(ctx, &payload)
                .await
                .map_err(|e| ClientError::PaymentHookError(e.to_string()))?;
        }

        Ok(payload)
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for X402Client {
    /// Sends the request; on a `402`, signs a payment and retries exactly
    /// once. A second `402` is never retried — it is surfaced to the caller
    /// as-is.
    #[cfg_attr(feature = "telemetry", instrument(name = "x402.reqwest.handle", skip_all, err))]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let retry_req = req.try_clone();
        let res = next.clone().run(req, extensions).await?;

        if res.status() != StatusCode::PAYMENT_REQUIRED {
            #[cfg(feature = "telemetry")]
            trace!(status = ?res.status(), "no payment required");
            return Ok(res);
        }

        let ctx = RequestContext {
            resource_url: res.url().to_string(),
            method: retry_req
                .as_ref()
                .map(|r| r.method().clone())
                .unwrap_or(http::Method::GET),
        };

        let status = res.status();
        let version = res.version();
        let headers = res.headers().clone();
        let body = res
            .bytes()
            .await
            .map_err(|e| rqm::Error::Middleware(e.into()))?;

        let payment_required: Option<PaymentRequired> = serde_json::from_slice(&body).ok();
        let Some(payment_required) = payment_required else {
            #[cfg(feature = "telemetry")]
            debug!("402 body did not parse as PaymentRequired; returning original response");
            return Ok(rebuild_response(status, version, headers, body));
        };

        #[cfg(feature = "telemetry")]
        info!(url = %ctx.resource_url, "received 402, creating payment payload");

        let payload = self
            .create_payment_payload(&payment_required, &ctx)
            .await
            .map_err(|e| rqm::Error::Middleware(e.into()))?;

        let header_value = encode_payment_payload(&payload).map_err(rqm::Error::Middleware)?;

        let mut retry = retry_req.ok_or(rqm::Error::Middleware(ClientError::RequestNotCloneable.into()))?;
        retry.headers_mut().insert(PAYMENT_HEADER_NAME, header_value);

        next.run(retry, extensions).await
    }
}

/// Reassembles a `reqwest::Response` after its body has been buffered out
/// from under it, so a 402 whose body didn't parse as `PaymentRequired` can
/// still be returned to the caller unchanged (per the "return the original
/// response" fallback).
fn rebuild_response(
    status: StatusCode,
    version: http::Version,
    headers: http::HeaderMap,
    body: bytes::Bytes,
) -> Response {
    let mut builder = http::Response::builder().status(status).version(version);
    if let Some(map) = builder.headers_mut() {
        *map = headers;
    }
    let http_response = builder
        .body(reqwest::Body::from(body))
        .expect("status/version/headers taken from an existing response");
    Response::from(http_response)
}

fn encode_payment_payload(payload: &PaymentPayload) -> Result<http::HeaderValue, ClientError> {
    let json = serde_json::to_vec(payload)?;
    let encoded = Base64Bytes::encode(json);
    http::HeaderValue::from_bytes(encoded.as_ref())
        .map_err(|_| ClientError::MalformedPaymentRequired)
}

/// Decodes the settlement receipt a resource server attaches to a paid
/// response. `None` if the header is absent or undecodable (e.g. the
/// response never went through the gate, or payment wasn't required).
pub fn settlement_receipt(response: &Response) -> Option<SettleResponse> {
    let header = response.headers().get(PAYMENT_RESPONSE_HEADER_NAME)?;
    let decoded = Base64Bytes::from(header.as_bytes()).decode().ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Re-exported for callers that want to inspect the raw settle outcome.
pub use proto::SettleOutcome;

//! An [`x402_types::facilitator::FacilitatorClient`] implementation that
//! talks to a _remote_ x402 facilitator over HTTP.
//!
//! This [`FacilitatorClient`] POSTs `{paymentPayload, paymentRequirements}`
//! to `{baseUrl}/verify` and `/settle`, and GETs `/supported`. Non-2xx
//! responses are surfaced as [`FacilitatorClientError::HttpStatus`], which
//! `x402-axum`'s gate pipeline maps to `facilitator_unreachable` — distinct
//! from a successfully-parsed `{isValid:false}` answer.
//!
//! ## Example
//!
//! ```rust
//! use x402_axum::facilitator_client::FacilitatorClient;
//!
//! let facilitator = FacilitatorClient::try_from("https://facilitator.example/").unwrap();
//! ```
//!
//! This client is cheap to clone and internally shares a connection pool via
//! `reqwest::Client`, making it safe and efficient to reuse across multiple
//! Axum routes or concurrent tasks.
//!
//! ## Features
//!
//! - Uses `reqwest` for async HTTP requests
//! - Supports optional timeout, static headers, and a pluggable per-request
//!   authentication header provider
//! - Integrates with `tracing` if the `telemetry` feature is enabled

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use std::fmt::Display;
#[cfg(feature = "telemetry")]
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use x402_types::proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

#[cfg(feature = "telemetry")]
use tracing::{Instrument, Span};

/// Produces headers to attach to every outgoing request, evaluated fresh
/// each call (e.g. to mint a short-lived bearer token).
pub type AuthHeaderProvider = Arc<dyn Fn() -> HeaderMap + Send + Sync>;

/// A client for communicating with a remote x402 facilitator.
///
/// Handles `/verify`, `/settle`, and `/supported` endpoints via JSON HTTP.
#[derive(Clone)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator (e.g. `https://facilitator.example/`)
    #[allow(dead_code)] // Public for consumption by downstream crates.
    base_url: Url,
    /// Full URL to `POST /verify` requests
    verify_url: Url,
    /// Full URL to `POST /settle` requests
    settle_url: Url,
    /// Full URL to `GET /supported` requests
    supported_url: Url,
    /// Shared Reqwest HTTP client
    client: Client,
    /// Static headers sent with every request
    headers: HeaderMap,
    /// Optional per-request authentication header provider, evaluated fresh
    /// before every request (e.g. to mint a short-lived bearer token).
    auth_headers: Option<AuthHeaderProvider>,
    /// Optional request timeout
    timeout: Option<Duration>,
}

impl std::fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl x402_types::facilitator::FacilitatorClient for FacilitatorClient {
    type Error = FacilitatorClientError;

    #[cfg(feature = "telemetry")]
    async fn verify(&self, request: VerifyRequest) -> Result<VerifyResponse, FacilitatorClientError> {
        with_span(
            FacilitatorClient::verify(self, request),
            tracing::info_span!("x402.facilitator_client.verify", timeout = ?self.timeout),
        )
        .await
    }

    #[cfg(not(feature = "telemetry"))]
    async fn verify(&self, request: VerifyRequest) -> Result<VerifyResponse, FacilitatorClientError> {
        FacilitatorClient::verify(self, request).await
    }

    #[cfg(feature = "telemetry")]
    async fn settle(&self, request: SettleRequest) -> Result<SettleResponse, FacilitatorClientError> {
        with_span(
            FacilitatorClient::settle(self, request),
            tracing::info_span!("x402.facilitator_client.settle", timeout = ?self.timeout),
        )
        .await
    }

    #[cfg(not(feature = "telemetry"))]
    async fn settle(&self, request: SettleRequest) -> Result<SettleResponse, FacilitatorClientError> {
        FacilitatorClient::settle(self, request).await
    }

    async fn supported(&self) -> Result<SupportedResponse, Self::Error> {
        FacilitatorClient::supported(self).await
    }
}

/// Errors that can occur while interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// A non-2xx response: distinct from a successfully-parsed
    /// `{isValid:false}`/`{success:false}` answer. Resource-server callers
    /// map this to `facilitator_unreachable`.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl FacilitatorClient {
    /// Returns the base URL used by this client.
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./verify` URL relative to [`FacilitatorClient::base_url`].
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// Returns the computed `./settle` URL relative to [`FacilitatorClient::base_url`]
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    /// Returns the computed `./supported` URL relative to [`FacilitatorClient::base_url`]
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn supported_url(&self) -> &Url {
        &self.supported_url
    }

    /// Returns any static headers configured on the client.
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the configured timeout, if any.
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn timeout(&self) -> &Option<Duration> {
        &self.timeout
    }

    /// Constructs a new [`FacilitatorClient`] from a base URL.
    ///
    /// This sets up `./verify`, `./settle`, and `./supported` endpoint URLs
    /// relative to the base.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let client = Client::new();
        let verify_url =
            base_url
                .join("./verify")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./verify URL",
                    source: e,
                })?;
        let settle_url =
            base_url
                .join("./settle")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./settle URL",
                    source: e,
                })?;
        let supported_url =
            base_url
                .join("./supported")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./supported URL",
                    source: e,
                })?;
        Ok(Self {
            client,
            base_url,
            verify_url,
            settle_url,
            supported_url,
            headers: HeaderMap::new(),
            auth_headers: None,
            timeout: None,
        })
    }

    /// Attaches static headers to all future requests.
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers = headers;
        this
    }

    /// Registers a callback invoked fresh before every request to produce
    /// authentication headers (e.g. a bearer token that may need refreshing).
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn with_auth_header_provider(&self, provider: AuthHeaderProvider) -> Self {
        let mut this = self.clone();
        this.auth_headers = Some(provider);
        this
    }

    /// Sets a timeout for all future requests.
    #[allow(dead_code)] // Public for consumption by downstream crates.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    /// Sends a `POST /verify` request to the facilitator.
    pub async fn verify(&self, request: VerifyRequest) -> Result<VerifyResponse, FacilitatorClientError> {
        let body = self
            .post_raw(&self.verify_url, "POST /verify", request.as_str())
            .await?;
        Ok(VerifyResponse(body))
    }

    /// Sends a `POST /settle` request to the facilitator.
    pub async fn settle(&self, request: SettleRequest) -> Result<SettleResponse, FacilitatorClientError> {
        let body = self
            .post_raw(&self.settle_url, "POST /settle", request.as_str())
            .await?;
        Ok(SettleResponse(body))
    }

    pub async fn supported(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        self.get_json(&self.supported_url, "GET /supported").await
    }

    fn apply_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(provider) = &self.auth_headers {
            for (key, value) in (provider)().iter() {
                req = req.header(key, value);
            }
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        req
    }

    /// POSTs a pre-serialized JSON body (the raw payment payload document)
    /// and returns the parsed response as a `serde_json::Value`.
    async fn post_raw(
        &self,
        url: &Url,
        context: &'static str,
        json_body: &str,
    ) -> Result<serde_json::Value, FacilitatorClientError> {
        let req = self.apply_headers(
            self.client
                .post(url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(json_body.to_string()),
        );
        let http_response = req
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        let result = if http_response.status().is_success() {
            http_response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
            Err(FacilitatorClientError::HttpStatus { context, status, body })
        };

        record_result_on_span(&result);

        result
    }

    /// Generic GET helper that handles JSON deserialization, error mapping,
    /// timeout application, and telemetry integration.
    async fn get_json<R>(&self, url: &Url, context: &'static str) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let req = self.apply_headers(self.client.get(url.clone()));
        let http_response = req
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        let result = if http_response.status().is_success() {
            http_response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
            Err(FacilitatorClientError::HttpStatus { context, status, body })
        };

        record_result_on_span(&result);

        result
    }
}

/// Converts a string URL into a `FacilitatorClient`, parsing the URL and calling `try_new`.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize: strip trailing slashes and add a single trailing slash
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        FacilitatorClient::try_new(url)
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to facilitator failed");
        }
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}

/// Instruments a future with a given tracing span.
#[cfg(feature = "telemetry")]
fn with_span<F: Future>(fut: F, span: Span) -> impl Future<Output = F::Output> {
    fut.instrument(span)
}

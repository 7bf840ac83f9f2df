//! Builder utilities for integrating x402 with reqwest.
//!
//! This module provides traits and types for building reqwest clients
//! with x402 payment middleware.

use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

use crate::client::X402Client;

/// Trait for adding x402 payment handling to reqwest clients.
///
/// This trait is implemented on [`Client`] and [`ClientBuilder`], allowing
/// you to create a reqwest client with automatic x402 payment handling.
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use reqwest::Client;
/// use x402_reqwest::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
/// use x402_scheme::ClientSchemeRegistry;
///
/// let registry = Arc::new(ClientSchemeRegistry::new());
/// let x402_client = X402Client::new(registry);
///
/// let http_client = Client::new()
///     .with_payments(x402_client)
///     .build();
/// ```
pub trait ReqwestWithPayments<A> {
    /// Adds x402 payment middleware to the client or builder.
    fn with_payments(self, x402_client: X402Client) -> ReqwestWithPaymentsBuilder<A>;
}

impl ReqwestWithPayments<Client> for Client {
    fn with_payments(self, x402_client: X402Client) -> ReqwestWithPaymentsBuilder<Client> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

impl ReqwestWithPayments<ClientBuilder> for ClientBuilder {
    fn with_payments(self, x402_client: X402Client) -> ReqwestWithPaymentsBuilder<ClientBuilder> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

/// Builder for creating a reqwest client with x402 middleware.
pub struct ReqwestWithPaymentsBuilder<A> {
    inner: A,
    x402_client: X402Client,
}

/// Trait for building the final client from a [`ReqwestWithPaymentsBuilder`].
pub trait ReqwestWithPaymentsBuild {
    /// The type returned by [`Self::build`].
    type BuildResult;
    /// The type returned by [`Self::builder`].
    type BuilderResult;

    /// Builds the client, consuming the builder.
    fn build(self) -> Self::BuildResult;

    /// Returns the underlying reqwest client builder with middleware added.
    fn builder(self) -> Self::BuilderResult;
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client> {
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.x402_client)
    }
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder> {
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let builder = self.builder()?;
        Ok(builder.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.x402_client))
    }
}

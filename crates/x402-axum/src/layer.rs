//! A `tower::Layer` that wraps an entire app (not a single route) in the
//! x402 gate: requests matching a configured route are charged per
//! [`crate::paygate::Paygate`]; everything else passes through unchanged
//! (scenario S1 — free route passthrough).

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::extract::Request;
use axum_core::response::Response;
use tower::Service;
use tower::util::BoxCloneSyncService;
use url::Url;

use x402_scheme::ResourceServerSchemeRegistry;
use x402_types::facilitator::FacilitatorClient;
use x402_types::proto::v2::ExtensionDescriptor;

use crate::paygate::{AcceptSpec, ExtensionValidator, Paygate, ResourceInfoBuilder};
use crate::route::RouteKey;
use crate::route_config::RouteConfig;

#[derive(Clone)]
struct RouteEntry {
    accepts: Arc<Vec<AcceptSpec>>,
    resource: ResourceInfoBuilder,
    extensions: Arc<HashMap<String, ExtensionDescriptor>>,
    extension_hooks: Arc<HashMap<String, ExtensionValidator>>,
}

/// Builds an [`X402Gate`]: a shared facilitator client, resource-server
/// scheme registry, and the table of routes it protects.
pub struct X402GateBuilder<TFacilitator> {
    facilitator: TFacilitator,
    registry: Arc<ResourceServerSchemeRegistry>,
    base_url: Option<Url>,
    routes: Vec<(RouteKey, RouteEntry)>,
}

impl<TFacilitator> X402GateBuilder<TFacilitator> {
    pub fn new(facilitator: TFacilitator, registry: Arc<ResourceServerSchemeRegistry>) -> Self {
        Self {
            facilitator,
            registry,
            base_url: None,
            routes: Vec::new(),
        }
    }

    /// Base URL used to resolve a route's resource URL when neither the
    /// route nor the request specifies one explicitly.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Registers a protected route from its configuration.
    pub fn route(self, config: RouteConfig) -> Self {
        self.route_with_extensions(config, HashMap::new())
    }

    /// Registers a protected route, additionally wiring server-side
    /// validation hooks for any extensions it declares. `hooks` is keyed by
    /// extension id; an id present in `config.extensions` with no matching
    /// hook is advertised but never validated.
    pub fn route_with_extensions(
        mut self,
        config: RouteConfig,
        hooks: HashMap<String, ExtensionValidator>,
    ) -> Self {
        let route_key = config.route_key();
        let resource = ResourceInfoBuilder {
            description: config.description.clone(),
            mime_type: config.mime_type.clone(),
            url: config.resource_url.clone(),
        };
        let extensions = Arc::new(config.extensions.clone());
        let accepts = Arc::new(
            config
                .accepts
                .into_iter()
                .map(AcceptSpec::from)
                .collect::<Vec<_>>(),
        );
        self.routes.push((
            route_key,
            RouteEntry {
                accepts,
                resource,
                extensions,
                extension_hooks: Arc::new(hooks),
            },
        ));
        self
    }

    pub fn build(self) -> X402Gate<TFacilitator> {
        X402Gate {
            facilitator: self.facilitator,
            registry: self.registry,
            base_url: self.base_url,
            routes: Arc::new(self.routes),
        }
    }
}

/// A `tower::Layer` gating an entire app's routes behind x402 payment.
///
/// Unmatched requests pass through to the wrapped service untouched; matched
/// requests are driven through [`Paygate`]'s verify/settle pipeline.
#[derive(Clone)]
pub struct X402Gate<TFacilitator> {
    facilitator: TFacilitator,
    registry: Arc<ResourceServerSchemeRegistry>,
    base_url: Option<Url>,
    routes: Arc<Vec<(RouteKey, RouteEntry)>>,
}

impl<TFacilitator> X402Gate<TFacilitator> {
    fn find(&self, req: &Request) -> Option<RouteEntry> {
        let method = req.method();
        let path = req.uri().path();
        self.routes
            .iter()
            .find(|(key, _)| key.matches(method, path))
            .map(|(_, entry)| entry.clone())
    }
}

impl<S, TFacilitator> tower::Layer<S> for X402Gate<TFacilitator>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send,
    TFacilitator: Clone,
{
    type Service = X402GateService<TFacilitator>;

    fn layer(&self, inner: S) -> Self::Service {
        X402GateService {
            gate: self.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// The boxed [`tower::Service`] produced by [`X402Gate`].
#[derive(Clone)]
pub struct X402GateService<TFacilitator> {
    gate: X402Gate<TFacilitator>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<TFacilitator> Service<Request> for X402GateService<TFacilitator>
where
    TFacilitator: FacilitatorClient + Clone + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let inner = self.inner.clone();
        match self.gate.find(&req) {
            None => Box::pin(async move {
                let mut inner = inner;
                inner.call(req).await
            }),
            Some(entry) => {
                let resource = entry.resource.as_resource_info(self.gate.base_url.as_ref(), &req);
                let paygate = Paygate {
                    facilitator: self.gate.facilitator.clone(),
                    registry: Arc::clone(&self.gate.registry),
                    accepts: Arc::clone(&entry.accepts),
                    resource,
                    extensions: Arc::clone(&entry.extensions),
                    extension_hooks: Arc::clone(&entry.extension_hooks),
                };
                Box::pin(async move { paygate.handle_request(inner, req).await })
            }
        }
    }
}

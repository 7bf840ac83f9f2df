//! JSON-configurable route definitions: one `RouteConfig` per protected
//! route, loaded the way the facilitator binary loads chain/scheme config
//! (plain `serde::Deserialize` structs, `#[serde(default = ...)]` functions).

use std::collections::HashMap;

use serde::Deserialize;

use x402_scheme::PriceSpec;
use x402_types::chain::ChainId;
use x402_types::proto::v2::ExtensionDescriptor;

use crate::paygate::AcceptSpec;
use crate::route::RouteKey;

fn default_scheme() -> String {
    "exact".to_string()
}

fn default_max_timeout_seconds() -> u64 {
    60
}

fn default_mime_type() -> String {
    "application/json".to_string()
}

fn default_method() -> String {
    "*".to_string()
}

/// One payment method a route accepts, as loaded from configuration before
/// price resolution against a scheme registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub network: ChainId,
    pub price: PriceSpec,
    pub pay_to: String,
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
}

impl From<AcceptConfig> for AcceptSpec {
    fn from(config: AcceptConfig) -> Self {
        AcceptSpec::new(config.network, config.scheme, config.price, config.pay_to)
            .with_max_timeout_seconds(config.max_timeout_seconds)
    }
}

/// A protected route: the `(method, pattern)` it gates, what it charges,
/// and how the resource is described in the `402` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// HTTP method this route gates, or `"*"` for any method.
    #[serde(default = "default_method")]
    pub method: String,
    /// Route pattern; see [`RouteKey`] for `*`/`**` syntax.
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    /// Explicit resource URL. When absent, it's derived from the request's
    /// `Host` header (or a configured base URL) plus the request path.
    #[serde(default)]
    pub resource_url: Option<String>,
    /// Payment methods this route accepts, tried in order by clients.
    pub accepts: Vec<AcceptConfig>,
    /// Extensions declared for this route, advertised on every synthesized
    /// payment requirement. Validation hooks for these are registered
    /// separately, via `X402GateBuilder::route_with_extensions`, since a
    /// hook is a closure and cannot come from configuration.
    #[serde(default)]
    pub extensions: HashMap<String, ExtensionDescriptor>,
}

impl RouteConfig {
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(Some(self.method.as_str()), &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let json = serde_json::json!({
            "path": "/premium/*",
            "accepts": [
                { "network": "eip155:8453", "price": "$0.10", "payTo": "0xabc" }
            ]
        });
        let config: RouteConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.method, "*");
        assert_eq!(config.mime_type, "application/json");
        assert_eq!(config.accepts[0].scheme, "exact");
        assert_eq!(config.accepts[0].max_timeout_seconds, 60);
    }

    #[test]
    fn overrides_apply() {
        let json = serde_json::json!({
            "method": "GET",
            "path": "/premium",
            "description": "premium content",
            "mimeType": "text/html",
            "accepts": [
                {
                    "scheme": "exact",
                    "network": "eip155:8453",
                    "price": "$1.00",
                    "payTo": "0xabc",
                    "maxTimeoutSeconds": 120
                }
            ]
        });
        let config: RouteConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.method, "GET");
        assert_eq!(config.mime_type, "text/html");
        assert_eq!(config.accepts[0].max_timeout_seconds, 120);
    }
}

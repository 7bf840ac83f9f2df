//! Route price configuration.
//!
//! Resolving a [`PriceSpec`] into an on-chain [`AssetAmount`] is a
//! scheme-specific concern (it depends on the asset's decimals and native
//! integer width), so this module only carries the configuration shape; see
//! `ResourceServerSchemeHandler::parse_price` implementations, e.g.
//! `x402-chain-eip155`'s `Eip155TokenDeployment::parse`, for the actual
//! decimal arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A route's configured price, in one of the three forms the spec allows.
///
/// `Literal` covers both the `"$0.10"` USD-denominated form and the bare
/// `"0.10"` / `0.10` native-asset form — the two are textually
/// distinguished (a leading `$`) rather than separate JSON shapes, so a
/// single variant with a custom deserializer (accepting either a JSON
/// string or number) avoids an ambiguous `#[serde(untagged)]` dispatch
/// between two string-shaped variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceSpec {
    Literal(#[serde(deserialize_with = "literal_price::deserialize")] String),
    /// A pre-parsed amount, used verbatim after validation.
    Exact {
        amount: String,
        asset: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extra: Option<serde_json::Value>,
    },
}

impl PriceSpec {
    /// `true` if this is a `"$N.NN"` USD-denominated literal.
    pub fn is_usd(&self) -> bool {
        matches!(self, PriceSpec::Literal(s) if s.starts_with('$'))
    }
}

mod literal_price {
    use serde::de::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected a price string or number, got {other}"
            ))),
        }
    }
}

/// The resolved on-chain amount for a [`PriceSpec`], specific to one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAmount {
    /// The amount in the asset's smallest unit, as a decimal integer string.
    pub amount: String,
    /// The asset identifier (token address, or empty for the chain's native asset).
    pub asset: String,
    /// Scheme-specific extra hints to merge into requirements.
    pub extra: Option<serde_json::Value>,
}

impl fmt::Display for PriceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSpec::Literal(s) => write!(f, "{s}"),
            PriceSpec::Exact { amount, asset, .. } => write!(f, "{amount} {asset}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_spec_deserializes_all_three_forms() {
        let usd: PriceSpec = serde_json::from_str("\"$0.10\"").unwrap();
        assert!(matches!(&usd, PriceSpec::Literal(s) if s == "$0.10"));
        assert!(usd.is_usd());

        let native: PriceSpec = serde_json::from_str("0.10").unwrap();
        assert!(matches!(&native, PriceSpec::Literal(s) if s == "0.10"));
        assert!(!native.is_usd());

        let exact: PriceSpec =
            serde_json::from_str(r#"{"amount":"1000","asset":"0xUSDC"}"#).unwrap();
        assert!(matches!(exact, PriceSpec::Exact { .. }));
    }
}

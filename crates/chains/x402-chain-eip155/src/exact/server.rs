//! Resource-server-role handler: turns a route's configured [`PriceSpec`]
//! into a concrete on-chain asset amount for a single `eip155` chain.

use std::collections::HashMap;

use serde_json::json;
use x402_scheme::{AssetAmount, PriceSpec, ResourceServerSchemeHandler, SchemeHandlerError};
use x402_types::chain::ChainId;

use crate::chain::{AssetTransferMethod, Eip155TokenDeployment};

/// Resolves route prices against a fixed set of known token deployments on
/// one `eip155` chain (typically just the chain's canonical USDC).
///
/// A `"$N.NN"` or bare `"N.NN"` literal price is resolved against
/// [`Self::default_asset`]; a [`PriceSpec::Exact`] is taken at face value
/// (it already names its own asset).
pub struct Eip155ExactServer {
    chain_id: ChainId,
    default_asset: Eip155TokenDeployment,
}

impl Eip155ExactServer {
    pub fn new(chain_id: ChainId, default_asset: Eip155TokenDeployment) -> Self {
        Self {
            chain_id,
            default_asset,
        }
    }
}

impl ResourceServerSchemeHandler for Eip155ExactServer {
    fn parse_price(
        &self,
        price: &PriceSpec,
        network: &ChainId,
    ) -> Result<AssetAmount, SchemeHandlerError> {
        if *network != self.chain_id {
            return Err(SchemeHandlerError::Rejected(format!(
                "server handler for {} cannot price a route on {network}",
                self.chain_id
            )));
        }
        match price {
            PriceSpec::Literal(s) => {
                let deployed = self
                    .default_asset
                    .parse(s.as_str())
                    .map_err(|e| SchemeHandlerError::Rejected(e.to_string()))?;
                let extra = match &self.default_asset.transfer_method {
                    AssetTransferMethod::Eip3009 { name, version } => {
                        json!({ "name": name, "version": version })
                    }
                    AssetTransferMethod::Permit2 => json!({}),
                };
                Ok(AssetAmount {
                    amount: deployed.amount.to_string(),
                    asset: self.default_asset.address.to_checksum(None),
                    extra: Some(extra),
                })
            }
            PriceSpec::Exact {
                amount,
                asset,
                extra,
            } => Ok(AssetAmount {
                amount: amount.clone(),
                asset: asset.clone(),
                extra: extra.clone(),
            }),
        }
    }
}

/// Per-chain table of known token deployments, keyed by chain ID, used to
/// build one [`Eip155ExactServer`] per configured route network.
pub type KnownDeployments = HashMap<ChainId, Eip155TokenDeployment>;

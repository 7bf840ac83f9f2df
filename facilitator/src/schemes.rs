//! Builds the facilitator-role scheme registry from configured chains.
//!
//! One [`Eip155ExactFacilitator`] is registered per configured `eip155`
//! chain, under that chain's exact [`ChainIdPattern`]. A chain with no
//! matching entry in `schemes` is registered by default; `schemes` lets an
//! operator disable a `(network, scheme)` pair without removing the chain.

use std::sync::Arc;

use x402_chain_eip155::chain::Eip155ChainProvider;
use x402_chain_eip155::exact::{Eip155ExactFacilitator, SCHEME_NAME};
use x402_scheme::FacilitatorSchemeRegistry;
use x402_types::chain::{ChainId, ChainIdPattern, ChainRegistry};
use x402_types::scheme::SchemeConfig;

const X402_VERSION: u8 = 2;

pub fn build_registry(
    chains: &ChainRegistry<Arc<Eip155ChainProvider>>,
    scheme_configs: &[SchemeConfig],
) -> FacilitatorSchemeRegistry {
    let mut registry = FacilitatorSchemeRegistry::new();
    for (chain_id, provider) in chains.iter() {
        if !is_enabled(chain_id, scheme_configs) {
            continue;
        }
        let handler = Arc::new(Eip155ExactFacilitator::new(Arc::clone(provider)));
        registry.register(
            ChainIdPattern::exact(chain_id.namespace(), chain_id.reference()),
            SCHEME_NAME,
            X402_VERSION,
            handler,
        );
    }
    registry
}

fn is_enabled(chain_id: &ChainId, scheme_configs: &[SchemeConfig]) -> bool {
    if scheme_configs.is_empty() {
        return true;
    }
    scheme_configs
        .iter()
        .find(|c| {
            c.scheme == SCHEME_NAME && c.x402_version == X402_VERSION && c.network.matches(chain_id)
        })
        .map(|c| c.enabled)
        .unwrap_or(true)
}

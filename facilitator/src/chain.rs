//! Builds chain providers for every `eip155` chain this facilitator is
//! configured to serve.

use std::collections::HashMap;
use std::sync::Arc;

use x402_chain_eip155::chain::Eip155ChainProvider;
use x402_chain_eip155::chain::config::Eip155ChainConfig;
use x402_chain_eip155::chain::Eip155ChainReferenceFormatError;
use x402_types::chain::{ChainId, ChainRegistry, FromConfig};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ChainInitError {
    #[error("chain id {0} is not a valid eip155 chain reference: {1}")]
    InvalidChainId(ChainId, Eip155ChainReferenceFormatError),
    #[error("failed to initialize eip155 provider for {0}: {1}")]
    Provider(ChainId, Box<dyn std::error::Error>),
}

/// Connects to every `eip155` chain named in `config.chains`.
pub async fn build_chain_registry(
    config: &Config,
) -> Result<ChainRegistry<Arc<Eip155ChainProvider>>, ChainInitError> {
    let mut providers = HashMap::new();
    for (chain_id, inner) in &config.chains {
        let chain_reference = chain_id
            .clone()
            .try_into()
            .map_err(|e| ChainInitError::InvalidChainId(chain_id.clone(), e))?;
        let chain_config = Eip155ChainConfig {
            chain_reference,
            inner: inner.clone(),
        };
        let provider = Eip155ChainProvider::from_config(&chain_config)
            .await
            .map_err(|e| ChainInitError::Provider(chain_id.clone(), e))?;
        providers.insert(chain_id.clone(), Arc::new(provider));
    }
    Ok(ChainRegistry::new(providers))
}

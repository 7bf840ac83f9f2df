use x402_types::chain::ChainId;
use x402_types::networks::USDC;

use crate::chain::{AssetTransferMethod, Eip155ChainReference, Eip155TokenDeployment};

/// Convenient constructors for well-known EVM networks (`eip155` namespace).
///
/// Implemented for [`ChainId`] to get CAIP-2 identifiers, and for
/// [`USDC`](x402_types::networks::USDC) to get the canonical USDC deployment
/// on each chain. Only the networks this facilitator is configured to serve
/// by default are listed; any other `eip155` chain is still usable, just not
/// through one of these shortcuts.
#[allow(dead_code)]
pub trait KnownNetworkEip155<A> {
    /// Returns the instance for Base mainnet (eip155:8453).
    fn base() -> A;
    /// Returns the instance for Base Sepolia testnet (eip155:84532).
    fn base_sepolia() -> A;
}

impl KnownNetworkEip155<ChainId> for ChainId {
    fn base() -> ChainId {
        ChainId::new("eip155", "8453")
    }

    fn base_sepolia() -> ChainId {
        ChainId::new("eip155", "84532")
    }
}

impl KnownNetworkEip155<Eip155TokenDeployment> for USDC {
    fn base() -> Eip155TokenDeployment {
        Eip155TokenDeployment {
            chain_reference: Eip155ChainReference::new(8453),
            address: alloy_primitives::address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            decimals: 6,
            transfer_method: AssetTransferMethod::Eip3009 {
                name: "USD Coin".into(),
                version: "2".into(),
            },
        }
    }

    fn base_sepolia() -> Eip155TokenDeployment {
        Eip155TokenDeployment {
            chain_reference: Eip155ChainReference::new(84532),
            address: alloy_primitives::address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            decimals: 6,
            transfer_method: AssetTransferMethod::Eip3009 {
                name: "USDC".into(),
                version: "2".into(),
            },
        }
    }
}

//! Wire types for the `exact` scheme on `eip155`: an ERC-3009
//! `transferWithAuthorization` payload signed off-chain by the payer and
//! submitted on-chain by the facilitator.

use alloy_primitives::U256;
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};

use crate::chain::decimal_u256;

sol! {
    /// ERC-3009 gasless transfer entrypoint, plus the balance read used to
    /// verify the payer can actually cover the authorized amount.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IEip3009 {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;

        function balanceOf(address account) external view returns (uint256);
    }
}

sol! {
    /// The EIP-712 typed-data struct the payer signs. Field order and names
    /// are dictated by the ERC-3009 standard, not by this crate.
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

/// The `payload` field of an `exact`/`eip155` `PaymentPayload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    /// `0x`-prefixed 65-byte ECDSA signature over the EIP-712 authorization.
    pub signature: String,
    pub authorization: ExactEvmAuthorization,
}

/// The signed ERC-3009 authorization. Wire values are decimal strings;
/// `value`/`valid_after`/`valid_before` round-trip through [`decimal_u256`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    pub from: String,
    pub to: String,
    #[serde(with = "decimal_u256")]
    pub value: U256,
    #[serde(with = "decimal_u256")]
    pub valid_after: U256,
    #[serde(with = "decimal_u256")]
    pub valid_before: U256,
    /// `0x`-prefixed 32-byte random nonce, unique per authorization.
    pub nonce: String,
}

/// `extra` carried on `exact`/`eip155` payment requirements: the asset's
/// EIP-712 domain name/version, needed by both client and facilitator to
/// reconstruct the same signing hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Extra {
    pub name: String,
    pub version: String,
}

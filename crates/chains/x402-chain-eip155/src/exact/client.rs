//! Client-role handler: signs ERC-3009 authorizations against payment
//! requirements advertised by a resource server.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, eip712_domain};
use async_trait::async_trait;
use x402_scheme::{ClientSchemeHandler, SchemeHandlerError};
use x402_types::proto::v2::PaymentRequirements;

use crate::chain::Eip155ChainReference;
use crate::exact::types::{Eip3009Extra, ExactEvmAuthorization, ExactEvmPayload, TransferWithAuthorization};

/// Seconds of clock skew tolerated before `validAfter`.
const CLOCK_SKEW_SECS: u64 = 60;

/// Signs ERC-3009 `transferWithAuthorization` payloads with a single EOA key.
///
/// One instance covers every `eip155` chain: the signing domain is derived
/// per-call from the requirements' `network` and `extra.{name,version}`, so
/// nothing here is chain-specific beyond the numeric chain ID used in the
/// EIP-712 domain separator.
pub struct Eip155ExactClient {
    signer: PrivateKeySigner,
}

impl Eip155ExactClient {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl ClientSchemeHandler for Eip155ExactClient {
    async fn sign(
        &self,
        requirements: &PaymentRequirements,
        _resource_url: &str,
    ) -> Result<serde_json::Value, SchemeHandlerError> {
        let chain_reference: Eip155ChainReference = (&requirements.network)
            .try_into()
            .map_err(|e: crate::chain::Eip155ChainReferenceFormatError| {
                SchemeHandlerError::Rejected(e.to_string())
            })?;

        let to = Address::from_str(&requirements.pay_to)
            .map_err(|e| SchemeHandlerError::Rejected(format!("invalid payTo address: {e}")))?;
        let asset = Address::from_str(&requirements.asset)
            .map_err(|e| SchemeHandlerError::Rejected(format!("invalid asset address: {e}")))?;
        let value = U256::from_str(&requirements.amount)
            .map_err(|e| SchemeHandlerError::Rejected(format!("invalid amount: {e}")))?;
        let extra: Eip3009Extra = requirements
            .extra
            .clone()
            .ok_or_else(|| SchemeHandlerError::Rejected("missing extra.name/version".into()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| SchemeHandlerError::Rejected(format!("invalid extra: {e}")))
            })?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs();
        let valid_after = now.saturating_sub(CLOCK_SKEW_SECS);
        let valid_before = now + requirements.max_timeout_seconds;
        let nonce: [u8; 32] = rand::random();

        let authorization = TransferWithAuthorization {
            from: self.signer.address(),
            to,
            value,
            validAfter: U256::from(valid_after),
            validBefore: U256::from(valid_before),
            nonce: nonce.into(),
        };

        let domain = eip712_domain! {
            name: extra.name.clone(),
            version: extra.version.clone(),
            chain_id: chain_reference.inner(),
            verifying_contract: asset,
        };
        let signing_hash = authorization.eip712_signing_hash(&domain);
        let signature = self
            .signer
            .sign_hash(&signing_hash)
            .await
            .map_err(SchemeHandlerError::other)?;

        let payload = ExactEvmPayload {
            signature: format!("0x{}", alloy_primitives::hex::encode(signature.as_bytes())),
            authorization: ExactEvmAuthorization {
                from: self.signer.address().to_checksum(None),
                to: to.to_checksum(None),
                value,
                valid_after: U256::from(valid_after),
                valid_before: U256::from(valid_before),
                nonce: format!("0x{}", alloy_primitives::hex::encode(nonce)),
            },
        };
        serde_json::to_value(payload).map_err(SchemeHandlerError::other)
    }
}

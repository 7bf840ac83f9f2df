//! Facilitator-role handler: verifies and settles ERC-3009 authorizations
//! on a single `eip155` chain.
//!
//! Scope: EOA signatures only. A production facilitator additionally
//! recognizes ERC-1271 (smart-contract wallet) and ERC-6492 (counterfactual
//! smart-contract wallet, validated via a multicall that deploys the wallet
//! and submits the transfer in one shot) signatures. This illustrative
//! handler covers the plain externally-owned-account path and rejects
//! anything it can't recover a signer from.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, Signature, U256};
use alloy_provider::Provider;
use alloy_sol_types::{SolStruct, eip712_domain};
use async_trait::async_trait;
use x402_scheme::{FacilitatorSchemeHandler, SchemeHandlerError};
use x402_types::proto::v2::PaymentRequirements;
use x402_types::proto::{SettleOutcome, VerifyOutcome};

use crate::chain::{Eip155ChainReference, Eip155MetaTransactionProvider, MetaTransaction};
use crate::exact::types::{Eip3009Extra, ExactEvmPayload, IEip3009, TransferWithAuthorization};

/// Seconds of grace given to an authorization's `validBefore` deadline, to
/// absorb clock drift between facilitator and chain.
const EXPIRY_GRACE_SECS: u64 = 6;

/// Verifies and settles `exact`/`eip155` payments against one chain provider.
///
/// Construct one instance per configured `eip155` chain and register it into
/// a [`x402_scheme::FacilitatorSchemeRegistry`] under that chain's exact
/// [`x402_types::chain::ChainIdPattern`].
pub struct Eip155ExactFacilitator<P> {
    provider: Arc<P>,
}

impl<P> Eip155ExactFacilitator<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

/// A payload and its requirements, validated enough to know who signed it
/// and what it authorizes, but not yet checked against on-chain balance.
struct Checked {
    payload: ExactEvmPayload,
    asset: Address,
    payer: Address,
    to: Address,
    value: U256,
}

/// A rejection the caller is at fault for (bad payload, expired authorization,
/// wrong signer, insufficient balance) as opposed to an infrastructure fault.
enum Rejected {
    Reason(String),
}

impl<P> Eip155ExactFacilitator<P>
where
    P: Eip155MetaTransactionProvider + Send + Sync,
    P::Inner: Provider,
{
    fn static_checks(
        &self,
        payload_value: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<Checked, Rejected> {
        let chain_reference: Eip155ChainReference = (&requirements.network)
            .try_into()
            .map_err(|e: crate::chain::Eip155ChainReferenceFormatError| {
                Rejected::Reason(e.to_string())
            })?;
        if chain_reference.inner() != self.provider.chain().inner() {
            return Err(Rejected::Reason(format!(
                "payment requirements target chain {}, this facilitator serves {}",
                requirements.network,
                self.provider.chain().as_chain_id()
            )));
        }

        let payload: ExactEvmPayload = serde_json::from_value(payload_value.clone())
            .map_err(|e| Rejected::Reason(format!("malformed payload: {e}")))?;

        let from = Address::from_str(&payload.authorization.from)
            .map_err(|e| Rejected::Reason(format!("invalid authorization.from: {e}")))?;
        let to = Address::from_str(&payload.authorization.to)
            .map_err(|e| Rejected::Reason(format!("invalid authorization.to: {e}")))?;
        let expected_to = Address::from_str(&requirements.pay_to)
            .map_err(|e| Rejected::Reason(format!("invalid payTo address: {e}")))?;
        if to != expected_to {
            return Err(Rejected::Reason(format!(
                "authorization pays {to}, requirements demand {expected_to}"
            )));
        }
        let asset = Address::from_str(&requirements.asset)
            .map_err(|e| Rejected::Reason(format!("invalid asset address: {e}")))?;
        let required_amount = U256::from_str(&requirements.amount)
            .map_err(|e| Rejected::Reason(format!("invalid required amount: {e}")))?;
        if payload.authorization.value < required_amount {
            return Err(Rejected::Reason(format!(
                "authorization value {} is less than required {required_amount}",
                payload.authorization.value
            )));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs();
        let valid_before: u64 = payload
            .authorization
            .valid_before
            .try_into()
            .map_err(|_| Rejected::Reason("validBefore overflows u64".into()))?;
        let valid_after: u64 = payload
            .authorization
            .valid_after
            .try_into()
            .map_err(|_| Rejected::Reason("validAfter overflows u64".into()))?;
        if valid_before < now + EXPIRY_GRACE_SECS {
            return Err(Rejected::Reason("authorization has expired".into()));
        }
        if valid_after > now {
            return Err(Rejected::Reason("authorization is not yet valid".into()));
        }

        let extra: Eip3009Extra = requirements
            .extra
            .clone()
            .ok_or_else(|| Rejected::Reason("missing extra.name/version".into()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| Rejected::Reason(format!("invalid extra: {e}")))
            })?;

        let authorization = TransferWithAuthorization {
            from,
            to,
            value: payload.authorization.value,
            validAfter: payload.authorization.valid_after,
            validBefore: payload.authorization.valid_before,
            nonce: nonce_bytes(&payload.authorization.nonce)
                .map_err(|e| Rejected::Reason(e.to_string()))?
                .into(),
        };
        let domain = eip712_domain! {
            name: extra.name,
            version: extra.version,
            chain_id: chain_reference.inner(),
            verifying_contract: asset,
        };
        let signing_hash = authorization.eip712_signing_hash(&domain);

        let signature = decode_signature(&payload.signature)
            .map_err(|e| Rejected::Reason(format!("invalid signature: {e}")))?;
        let payer = signature
            .recover_address_from_prehash(&signing_hash)
            .map_err(|e| Rejected::Reason(format!("signature recovery failed: {e}")))?;
        if payer != from {
            return Err(Rejected::Reason(format!(
                "signature recovers to {payer}, authorization names {from} as sender"
            )));
        }

        let value = payload.authorization.value;
        Ok(Checked {
            payload,
            asset,
            payer,
            to,
            value,
        })
    }

    async fn assert_enough_balance(
        &self,
        asset: Address,
        payer: Address,
        required: U256,
    ) -> Result<(), SchemeHandlerError> {
        let contract = IEip3009::new(asset, self.provider.inner());
        let balance = contract
            .balanceOf(payer)
            .call()
            .await
            .map_err(SchemeHandlerError::other)?;
        if balance < required {
            return Err(SchemeHandlerError::Rejected(format!(
                "payer balance {balance} is less than required {required}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<P> FacilitatorSchemeHandler for Eip155ExactFacilitator<P>
where
    P: Eip155MetaTransactionProvider + Send + Sync,
    P::Inner: Provider,
{
    async fn verify(
        &self,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<x402_types::proto::VerifyResponse, SchemeHandlerError> {
        let checked = match self.static_checks(payload, requirements) {
            Ok(checked) => checked,
            Err(Rejected::Reason(reason)) => {
                let payer = payer_from_payload(payload);
                return Ok(VerifyOutcome::invalid(payer, reason).into());
            }
        };
        if let Err(e) = self
            .assert_enough_balance(checked.asset, checked.payer, checked.value)
            .await
        {
            if e.is_client_fault() {
                return Ok(VerifyOutcome::invalid(
                    Some(checked.payer.to_checksum(None)),
                    e.to_string(),
                )
                .into());
            }
            return Err(e);
        }
        Ok(VerifyOutcome::valid(checked.payer.to_checksum(None)).into())
    }

    async fn settle(
        &self,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<x402_types::proto::SettleResponse, SchemeHandlerError> {
        let checked = match self.static_checks(payload, requirements) {
            Ok(checked) => checked,
            Err(Rejected::Reason(reason)) => {
                return Ok(SettleOutcome::Error {
                    reason,
                    payer: payer_from_payload(payload),
                    transaction: String::new(),
                    network: requirements.network.to_string(),
                }
                .into());
            }
        };
        if let Err(e) = self
            .assert_enough_balance(checked.asset, checked.payer, checked.value)
            .await
        {
            if e.is_client_fault() {
                return Ok(SettleOutcome::Error {
                    reason: e.to_string(),
                    payer: Some(checked.payer.to_checksum(None)),
                    transaction: String::new(),
                    network: requirements.network.to_string(),
                }
                .into());
            }
            return Err(e);
        }

        let signature = decode_signature(&checked.payload.signature)
            .map_err(|e| SchemeHandlerError::Rejected(format!("invalid signature: {e}")))?;
        let (r, s, v) = signature_components(&signature);
        let from = Address::from_str(&checked.payload.authorization.from)
            .expect("validated by static_checks");
        let nonce = nonce_bytes(&checked.payload.authorization.nonce)
            .map_err(|e| SchemeHandlerError::Rejected(e.to_string()))?;

        let contract = IEip3009::new(checked.asset, self.provider.inner());
        let call = contract.transferWithAuthorization(
            from,
            checked.to,
            checked.payload.authorization.value,
            checked.payload.authorization.valid_after,
            checked.payload.authorization.valid_before,
            nonce.into(),
            v,
            r,
            s,
        );
        let calldata = call.calldata().clone();

        let receipt = self
            .provider
            .send_transaction(MetaTransaction {
                to: checked.asset,
                calldata,
                confirmations: 1,
            })
            .await
            .map_err(SchemeHandlerError::other)?;

        if !receipt.status() {
            return Ok(SettleOutcome::Error {
                reason: "settlement transaction reverted".into(),
                payer: Some(checked.payer.to_checksum(None)),
                transaction: receipt.transaction_hash.to_string(),
                network: requirements.network.to_string(),
            }
            .into());
        }

        Ok(SettleOutcome::Success {
            payer: checked.payer.to_checksum(None),
            transaction: receipt.transaction_hash.to_string(),
            network: requirements.network.to_string(),
        }
        .into())
    }
}

/// Best-effort extraction of `authorization.from` from an unverified payload,
/// so callers can report a `payer` even when the payload failed validation.
fn payer_from_payload(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("authorization")
        .and_then(|a| a.get("from"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn decode_signature(signature_hex: &str) -> Result<Signature, String> {
    let bytes = alloy_primitives::hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|e| e.to_string())?;
    if bytes.len() != 65 {
        return Err(format!("expected 65-byte signature, got {} bytes", bytes.len()));
    }
    Signature::from_raw(&bytes).map_err(|e| e.to_string())
}

fn signature_components(signature: &Signature) -> (alloy_primitives::B256, alloy_primitives::B256, u8) {
    let r = alloy_primitives::B256::from(signature.r());
    let s = alloy_primitives::B256::from(signature.s());
    let v: u8 = 27 + (signature.v() as u8);
    (r, s, v)
}

fn nonce_bytes(nonce_hex: &str) -> Result<[u8; 32], String> {
    let bytes = alloy_primitives::hex::decode(nonce_hex.trim_start_matches("0x"))
        .map_err(|e| e.to_string())?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "expected 32-byte nonce".to_string())?;
    Ok(array)
}

//! Protocol types for x402 payment messages.
//!
//! This module defines the wire format types used in the x402 protocol for
//! communication between buyers, sellers, and facilitators.
//!
//! # Key Types
//!
//! - [`SupportedPaymentKind`] - Describes a payment method supported by a facilitator
//! - [`SupportedResponse`] - Response from facilitator's `/supported` endpoint
//! - [`VerifyRequest`] / [`VerifyResponse`] - Payment verification messages
//! - [`SettleRequest`] / [`SettleResponse`] - Payment settlement messages
//! - [`PaymentVerificationError`] - Errors that can occur during verification
//! - [`PaymentProblem`] - Structured error response for payment failures
//!
//! # Wire Format
//!
//! All types serialize to JSON using camelCase field names. The protocol version
//! is indicated by the `x402Version` field in payment payloads and is currently
//! pinned to `2`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{VecSkipError, serde_as};
use std::collections::HashMap;

use crate::chain::ChainId;
use crate::scheme::SchemeHandlerSlug;

pub mod util;
pub mod v2;

/// Describes a payment method supported by a facilitator.
///
/// This type is returned in the [`SupportedResponse`] to indicate what
/// payment schemes, networks, and protocol versions a facilitator can handle.
///
/// # Example
///
/// ```json
/// {
///   "x402Version": 2,
///   "scheme": "exact",
///   "network": "eip155:8453"
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    /// The x402 protocol version (currently always 2).
    pub x402_version: u8,
    /// The payment scheme identifier (e.g., "exact").
    pub scheme: String,
    /// The CAIP-2 network identifier.
    pub network: String,
    /// Optional scheme-specific extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Response from a facilitator's `/supported` endpoint.
///
/// This response tells clients what payment methods the facilitator supports,
/// including protocol versions, schemes, networks, and signer addresses.
///
/// # Example
///
/// ```json
/// {
///   "kinds": [
///     { "x402Version": 2, "scheme": "exact", "network": "eip155:8453" }
///   ],
///   "extensions": [],
///   "signers": {
///     "eip155:8453": ["0x1234..."]
///   }
/// }
/// ```
#[serde_as]
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)] // Public for consumption by downstream crates.
pub struct SupportedResponse {
    /// List of supported payment kinds.
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedPaymentKind>,
    /// List of supported protocol extensions.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Map of chain IDs to signer addresses for that chain.
    #[serde(default)]
    pub signers: HashMap<ChainId, Vec<String>>,
}

/// Request to verify a payment before settlement.
///
/// This wrapper contains the payment payload and requirements sent by a client
/// to a facilitator for verification. The facilitator checks that the payment
/// authorization is valid, properly signed, and matches the requirements.
///
/// The inner JSON structure varies by scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest(Box<serde_json::value::RawValue>);

/// Request to settle a verified payment on-chain.
///
/// This is the same structure as [`VerifyRequest`], containing the payment
/// payload that was previously verified.
pub type SettleRequest = VerifyRequest;

impl From<Box<serde_json::value::RawValue>> for VerifyRequest {
    fn from(value: Box<serde_json::value::RawValue>) -> Self {
        Self(value)
    }
}

impl VerifyRequest {
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// Parses the wrapped raw JSON into a `serde_json::Value`.
    pub fn into_json(self) -> serde_json::Value {
        serde_json::from_str(self.0.get()).unwrap_or(serde_json::Value::Null)
    }

    /// Extracts the scheme handler slug from the request.
    ///
    /// This determines which scheme handler should process this payment
    /// based on the protocol version, chain ID, and scheme name.
    ///
    /// Returns `None` if the request format is invalid or the scheme is unknown.
    pub fn scheme_handler_slug(&self) -> Option<SchemeHandlerSlug> {
        #[derive(Debug, Deserialize, Serialize)]
        #[serde(rename_all = "camelCase")]
        struct VerifyRequestWire {
            pub x402_version: v2::X402Version2,
            pub payment_payload: PaymentPayloadWire,
        }

        #[derive(Debug, Deserialize, Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PaymentPayloadWire {
            pub accepted: PaymentPayloadAccepted,
        }

        #[derive(Debug, Deserialize, Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PaymentPayloadAccepted {
            pub network: ChainId,
            pub scheme: String,
        }

        let wire = serde_json::from_str::<VerifyRequestWire>(self.as_str()).ok()?;
        let chain_id = wire.payment_payload.accepted.network;
        let scheme = wire.payment_payload.accepted.scheme;
        Some(SchemeHandlerSlug::new(
            chain_id,
            wire.x402_version.into(),
            scheme,
        ))
    }
}

/// Response from a payment verification request.
///
/// Contains the verification result as JSON. The structure varies by scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse(pub serde_json::Value);

/// Response from a payment settlement request.
///
/// Contains the settlement result as JSON, typically including the
/// transaction hash if settlement was successful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse(pub serde_json::Value);

/// Result returned by a facilitator after verifying a payment payload against
/// the requirements it was offered against.
///
/// This is the structured form that scheme handlers build and then convert
/// into the opaque wire-level [`VerifyResponse`].
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The payload matches the requirements and passes all checks.
    Valid { payer: String },
    /// The payload was well-formed but failed verification; `payer` is set
    /// when it could be recovered even though the payment was rejected.
    Invalid {
        reason: String,
        payer: Option<String>,
    },
}

impl VerifyOutcome {
    /// Constructs a successful verification response with the given `payer` address.
    pub fn valid(payer: String) -> Self {
        VerifyOutcome::Valid { payer }
    }

    /// Constructs a failed verification response with the given `payer` address and error `reason`.
    pub fn invalid(payer: Option<String>, reason: String) -> Self {
        VerifyOutcome::Invalid { reason, payer }
    }
}

impl From<VerifyOutcome> for VerifyResponse {
    fn from(val: VerifyOutcome) -> Self {
        VerifyResponse(serde_json::to_value(val).expect("VerifyOutcome serialization failed"))
    }
}

impl TryFrom<VerifyResponse> for VerifyOutcome {
    type Error = serde_json::Error;
    fn try_from(value: VerifyResponse) -> Result<Self, Self::Error> {
        serde_json::from_value(value.0)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOutcomeWire {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default)]
    invalid_reason: Option<String>,
}

impl Serialize for VerifyOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            VerifyOutcome::Valid { payer } => VerifyOutcomeWire {
                is_valid: true,
                payer: Some(payer.clone()),
                invalid_reason: None,
            },
            VerifyOutcome::Invalid { reason, payer } => VerifyOutcomeWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyOutcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = VerifyOutcomeWire::deserialize(deserializer)?;
        match wire.is_valid {
            true => {
                let payer = wire
                    .payer
                    .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
                Ok(VerifyOutcome::Valid { payer })
            }
            false => {
                let reason = wire
                    .invalid_reason
                    .ok_or_else(|| serde::de::Error::missing_field("invalid_reason"))?;
                let payer = wire.payer;
                Ok(VerifyOutcome::Invalid { reason, payer })
            }
        }
    }
}

/// Result returned by a facilitator after attempting to settle a payment
/// on-chain.
///
/// Converts into the opaque wire-level [`SettleResponse`]. `transaction` is
/// always present on the wire, even as an empty string, so that clients do
/// not need to special-case a missing field on failure; `payer` is set when
/// known, even on a failed settlement.
#[derive(Debug)]
pub enum SettleOutcome {
    /// Settlement succeeded.
    Success {
        payer: String,
        transaction: String,
        network: String,
    },
    /// Settlement failed.
    Error {
        reason: String,
        payer: Option<String>,
        transaction: String,
        network: String,
    },
}

impl From<SettleOutcome> for SettleResponse {
    fn from(val: SettleOutcome) -> Self {
        SettleResponse(serde_json::to_value(val).expect("SettleOutcome serialization failed"))
    }
}

#[derive(Serialize, Deserialize)]
struct SettleOutcomeWire {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default)]
    pub transaction: String,
    pub network: String,
}

impl Serialize for SettleOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            SettleOutcome::Success {
                payer,
                transaction,
                network,
            } => SettleOutcomeWire {
                success: true,
                error_reason: None,
                payer: Some(payer.clone()),
                transaction: transaction.clone(),
                network: network.clone(),
            },
            SettleOutcome::Error {
                reason,
                payer,
                transaction,
                network,
            } => SettleOutcomeWire {
                success: false,
                error_reason: Some(reason.clone()),
                payer: payer.clone(),
                transaction: transaction.clone(),
                network: network.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleOutcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = SettleOutcomeWire::deserialize(deserializer)?;
        match wire.success {
            true => {
                let payer = wire
                    .payer
                    .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
                Ok(SettleOutcome::Success {
                    payer,
                    transaction: wire.transaction,
                    network: wire.network,
                })
            }
            false => {
                let reason = wire
                    .error_reason
                    .ok_or_else(|| serde::de::Error::missing_field("error_reason"))?;
                Ok(SettleOutcome::Error {
                    reason,
                    payer: wire.payer,
                    transaction: wire.transaction,
                    network: wire.network,
                })
            }
        }
    }
}

/// Errors that can occur during payment verification.
///
/// These errors are returned when a payment fails validation checks
/// performed by the facilitator before settlement.
#[derive(Debug, thiserror::Error)]
pub enum PaymentVerificationError {
    /// The payment payload format is invalid or malformed.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// The payment amount doesn't match the requirements.
    #[error("Payment amount is invalid with respect to the payment requirements")]
    InvalidPaymentAmount,
    /// The payment authorization's `validAfter` timestamp is in the future.
    #[error("Payment authorization is not yet valid")]
    Early,
    /// The payment authorization's `validBefore` timestamp has passed.
    #[error("Payment authorization is expired")]
    Expired,
    /// The payment's chain ID doesn't match the requirements.
    #[error("Payment chain id is invalid with respect to the payment requirements")]
    ChainIdMismatch,
    /// The payment recipient doesn't match the requirements.
    #[error("Payment recipient is invalid with respect to the payment requirements")]
    RecipientMismatch,
    /// The payment asset (token) doesn't match the requirements.
    #[error("Payment asset is invalid with respect to the payment requirements")]
    AssetMismatch,
    /// The payer's on-chain balance is insufficient.
    #[error("Onchain balance is not enough to cover the payment amount")]
    InsufficientFunds,
    #[error("Allowance is not enough to cover the payment amount")]
    InsufficientAllowance,
    /// The payment signature is invalid.
    #[error("{0}")]
    InvalidSignature(String),
    /// Transaction simulation failed.
    #[error("{0}")]
    TransactionSimulation(String),
    /// The chain is not supported by this facilitator.
    #[error("Unsupported chain")]
    UnsupportedChain,
    /// The payment scheme is not supported by this facilitator.
    #[error("Unsupported scheme")]
    UnsupportedScheme,
    /// The accepted payment details don't match the requirements.
    #[error("Accepted does not match payment requirements")]
    AcceptedRequirementsMismatch,
}

impl AsPaymentProblem for PaymentVerificationError {
    fn as_payment_problem(&self) -> PaymentProblem {
        let error_reason = match self {
            PaymentVerificationError::InvalidFormat(_) => ErrorReason::InvalidFormat,
            PaymentVerificationError::InvalidPaymentAmount => ErrorReason::InvalidPaymentAmount,
            PaymentVerificationError::InsufficientFunds => ErrorReason::InsufficientFunds,
            PaymentVerificationError::InsufficientAllowance => ErrorReason::InsufficientAllowance,
            PaymentVerificationError::Early => ErrorReason::InvalidPaymentEarly,
            PaymentVerificationError::Expired => ErrorReason::InvalidPaymentExpired,
            PaymentVerificationError::ChainIdMismatch => ErrorReason::ChainIdMismatch,
            PaymentVerificationError::RecipientMismatch => ErrorReason::RecipientMismatch,
            PaymentVerificationError::AssetMismatch => ErrorReason::AssetMismatch,
            PaymentVerificationError::InvalidSignature(_) => ErrorReason::InvalidSignature,
            PaymentVerificationError::TransactionSimulation(_) => {
                ErrorReason::TransactionSimulation
            }
            PaymentVerificationError::UnsupportedChain => ErrorReason::UnsupportedChain,
            PaymentVerificationError::UnsupportedScheme => ErrorReason::UnsupportedScheme,
            PaymentVerificationError::AcceptedRequirementsMismatch => {
                ErrorReason::AcceptedRequirementsMismatch
            }
        };
        PaymentProblem::new(error_reason, self.to_string())
    }
}

impl From<serde_json::Error> for PaymentVerificationError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidFormat(value.to_string())
    }
}

/// Machine-readable error reason codes for payment failures.
///
/// These codes are used in error responses to allow clients to
/// programmatically handle different failure scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// Header present but undecodable or shape-invalid.
    InvalidPayload,
    /// The payment payload format is invalid (synonym kept for legacy callers).
    InvalidFormat,
    /// The payment amount is incorrect.
    InvalidPaymentAmount,
    /// Payload's `accepted` amount doesn't match any entry in `accepts`.
    AmountMismatch,
    /// The payment authorization is not yet valid.
    InvalidPaymentEarly,
    /// The payment authorization has expired.
    InvalidPaymentExpired,
    /// The scheme-specific signature has expired.
    SignatureExpired,
    /// The authorization nonce has already been consumed.
    NonceUsed,
    /// The chain ID doesn't match.
    ChainIdMismatch,
    /// The payload's network identifier isn't recognized by the resolved handler.
    InvalidNetwork,
    /// The recipient address doesn't match.
    RecipientMismatch,
    /// The token asset doesn't match.
    AssetMismatch,
    /// The accepted details don't match requirements.
    AcceptedRequirementsMismatch,
    /// No entry in `accepts` matches the payload's accepted requirements.
    NoMatchingRequirement,
    /// The signature is invalid.
    InvalidSignature,
    /// Transaction simulation failed.
    TransactionSimulation,
    /// Insufficient on-chain balance.
    InsufficientFunds,
    /// Insufficient allowance.
    InsufficientAllowance,
    /// The chain is not supported.
    UnsupportedChain,
    /// The scheme is not supported.
    UnsupportedScheme,
    /// The declared `x402Version` isn't handled by the core.
    UnsupportedVersion,
    /// HTTP transport to the facilitator failed.
    FacilitatorUnreachable,
    /// Settle did not produce a finalized transaction.
    SettlementFailed,
    /// Settle did not complete within its allotted time.
    SettlementTimeout,
    /// The on-chain transaction reverted or failed to confirm.
    TransactionFailed,
    /// A client-side payment hook raised.
    PaymentHookError,
    /// An unexpected error occurred.
    UnexpectedError,
    /// Any unexpected exception in the core, mapped to HTTP 500.
    InternalError,
}

/// Trait for converting errors into structured payment problems.
pub trait AsPaymentProblem {
    /// Converts this error into a [`PaymentProblem`].
    fn as_payment_problem(&self) -> PaymentProblem;
}

/// A structured payment error with reason code and details.
///
/// This type is used to return detailed error information to clients
/// when a payment fails verification or settlement.
pub struct PaymentProblem {
    /// The machine-readable error reason.
    reason: ErrorReason,
    /// Human-readable error details.
    details: String,
}

impl PaymentProblem {
    /// Creates a new payment problem with the given reason and details.
    pub fn new(reason: ErrorReason, details: String) -> Self {
        Self { reason, details }
    }

    /// Returns the error reason code.
    pub fn reason(&self) -> ErrorReason {
        self.reason
    }

    /// Returns the human-readable error details.
    pub fn details(&self) -> &str {
        &self.details
    }
}

/// A payment required response that is returned with HTTP 402 status to
/// indicate that payment is required.
pub type PaymentRequired = v2::PaymentRequired;

/// Verbatim JSON for PaymentRequirements and other places.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OriginalJson(pub Box<serde_json::value::RawValue>);

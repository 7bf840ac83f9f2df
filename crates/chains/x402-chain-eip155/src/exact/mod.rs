//! The `exact` payment scheme on `eip155`: an ERC-3009 `transferWithAuthorization`
//! gasless transfer, signed off-chain by the payer (client) and submitted
//! on-chain by the facilitator.

pub mod types;
pub use types::{Eip3009Extra, ExactEvmAuthorization, ExactEvmPayload};

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub use client::Eip155ExactClient;

pub mod server;
pub use server::{Eip155ExactServer, KnownDeployments};

#[cfg(feature = "facilitator")]
pub mod facilitator;
#[cfg(feature = "facilitator")]
pub use facilitator::Eip155ExactFacilitator;

/// The scheme name this module implements, as it appears on the wire.
pub const SCHEME_NAME: &str = "exact";

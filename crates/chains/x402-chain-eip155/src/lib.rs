//! EIP-155 (EVM) chain support for the x402 payment protocol.
//!
//! This crate implements the `exact` payment scheme for EVM-compatible chains
//! using ERC-3009 `transferWithAuthorization`: a payer signs a gasless
//! transfer authorization off-chain (client role), a resource server prices
//! routes in that chain's tokens (server role), and a facilitator verifies
//! and broadcasts the authorization on-chain (facilitator role).
//!
//! # Architecture
//!
//! - [`chain`] - Core EVM chain types, RPC provider, and configuration
//! - [`exact`] - The `exact`/ERC-3009 scheme handlers for all three roles
//! - [`networks`] - Known token deployments (currently Base and Base Sepolia USDC)
//!
//! # Feature Flags
//!
//! - `server` - Resource-server-side price resolution
//! - `client` - Client-side payment signing
//! - `facilitator` - Facilitator-side payment verification and settlement
//! - `telemetry` - `tracing` instrumentation of chain RPC calls
//!
//! # Usage
//!
//! ```ignore
//! use x402_chain_eip155::exact::Eip155ExactClient;
//! use alloy_signer_local::PrivateKeySigner;
//!
//! let signer = PrivateKeySigner::random();
//! let client = Eip155ExactClient::new(signer);
//! let payload = client.sign(&requirements, "https://example.com/resource").await?;
//! ```

pub mod chain;
pub mod exact;

mod networks;
pub use networks::*;

//! Minimal x402 client: pays a single protected GET request on Base Sepolia
//! using an ERC-3009 `exact` authorization, then prints the settlement
//! receipt the resource server attached on success.

use std::env;
use std::sync::Arc;

use alloy_signer_local::PrivateKeySigner;
use dotenvy::dotenv;
use reqwest::Client;
use x402_chain_eip155::exact::{Eip155ExactClient, SCHEME_NAME};
use x402_reqwest::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client, settlement_receipt};
use x402_scheme::ClientSchemeRegistry;
use x402_types::chain::ChainIdPattern;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let signer: PrivateKeySigner = env::var("EVM_PRIVATE_KEY")?.parse()?;
    println!("Signer address: {:?}", signer.address());

    // A single client handler, registered under a family wildcard, covers
    // every eip155 chain: the EIP-712 domain is derived per-call from the
    // requirements the resource server sends back.
    let mut registry = ClientSchemeRegistry::new();
    registry.register(
        ChainIdPattern::wildcard("eip155"),
        SCHEME_NAME,
        2,
        Arc::new(Eip155ExactClient::new(signer)) as Arc<_>,
    );

    let x402_client = X402Client::new(Arc::new(registry));
    let http_client = Client::new().with_payments(x402_client).build();

    let url = env::var("RESOURCE_URL").unwrap_or_else(|_| "http://localhost:3000/premium".to_string());
    let response = http_client.get(&url).send().await?;

    if let Some(receipt) = settlement_receipt(&response) {
        println!("Settlement receipt: {receipt:?}");
    }
    println!("Response: {}", response.text().await?);

    Ok(())
}

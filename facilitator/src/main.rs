//! x402 facilitator HTTP entrypoint.
//!
//! Endpoints:
//! - `GET /verify` — machine-readable description of the verify endpoint
//! - `POST /verify` — verify a payment payload against requirements
//! - `GET /settle` — machine-readable description of the settle endpoint
//! - `POST /settle` — settle an accepted payment payload on-chain
//! - `GET /supported` — list supported payment kinds (version/scheme/network)
//! - `GET /health` — alias for `/supported`

mod chain;
mod config;
mod run;
mod schemes;

#[tokio::main]
async fn main() {
    if let Err(error) = run::run().await {
        eprintln!("x402-facilitator failed: {error}");
        std::process::exit(1);
    }
}

//! Configuration loading for the x402 facilitator binary.
//!
//! Configuration is a JSON file naming the `eip155` chains this facilitator
//! serves (RPC endpoints, signers, gas behavior) and, optionally, which
//! `(network, scheme)` pairs are enabled. The file path comes from `--config`
//! / `CONFIG`, defaulting to `config.json` in the working directory.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use x402_chain_eip155::chain::config::Eip155ChainConfigInner;
use x402_types::chain::ChainId;
use x402_types::scheme::SchemeConfig;

/// CLI arguments for the x402 facilitator server.
#[derive(Parser, Debug)]
#[command(name = "x402-facilitator", about = "x402 payment facilitator server")]
pub struct CliArgs {
    /// Path to the facilitator configuration file.
    #[arg(short, long, env = "CONFIG", default_value = "config.json")]
    pub config: PathBuf,
}

/// Top-level facilitator configuration, loaded from a JSON file.
///
/// # Example
///
/// ```json
/// {
///   "port": 8080,
///   "chains": {
///     "eip155:84532": {
///       "signers": ["$FACILITATOR_PRIVATE_KEY"],
///       "rpc": [{ "http": "https://sepolia.base.org" }]
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    pub port: u16,
    #[serde(default = "config_defaults::default_host")]
    pub host: IpAddr,
    /// Chains this facilitator serves, keyed by CAIP-2 chain ID.
    #[serde(default)]
    pub chains: HashMap<ChainId, Eip155ChainConfigInner>,
    /// Per-`(network, scheme)` enablement overrides. When empty, every
    /// configured chain serves the `exact` scheme at protocol version 2.
    #[serde(default)]
    pub schemes: Vec<SchemeConfig>,
}

mod config_defaults {
    use std::net::{IpAddr, Ipv4Addr};

    pub fn default_port() -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080)
    }

    pub fn default_host() -> IpAddr {
        std::env::var("HOST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Config {
    /// Parses `--config`/`CONFIG` from the process arguments and loads it.
    pub fn load() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::load_from_path(&args.config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

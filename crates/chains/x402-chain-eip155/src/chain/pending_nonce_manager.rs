//! A nonce manager that caches nonces locally and checks pending transactions on initialization.
//!
//! This implementation attempts to improve upon Alloy's `CachedNonceManager` by using
//! `.pending()` when fetching the initial nonce, which includes pending transactions in
//! the mempool. This prevents "nonce too low" errors when the application restarts while
//! transactions are still pending.
//!
//! # How it works
//!
//! - **First call for an address**: fetches the nonce using `.pending()`, which includes
//!   transactions in the mempool, not just confirmed transactions.
//! - **Subsequent calls**: increments the cached nonce locally without querying the RPC.
//! - **Per-address tracking**: each address has its own cached nonce, allowing concurrent
//!   transaction submission from multiple addresses.
//!
//! The nonce cache is shared across all clones via `Arc<DashMap>`; each address's nonce is
//! protected by its own `Mutex` to prevent race conditions during allocation.

use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_provider::fillers::NonceManager;
use alloy_transport::TransportResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<u64>>>>,
}

#[async_trait]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(&self, provider: &P, address: Address) -> TransportResult<u64>
    where
        P: Provider<N>,
        N: alloy_network::Network,
    {
        const NONE: u64 = u64::MAX;

        let nonce = {
            let rm = self
                .nonces
                .entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(NONE)));
            Arc::clone(rm.value())
        };

        let mut nonce = nonce.lock().await;
        let new_nonce = if *nonce == NONE {
            #[cfg(feature = "telemetry")]
            tracing::trace!(%address, "fetching nonce");
            provider.get_transaction_count(address).pending().await?
        } else {
            #[cfg(feature = "telemetry")]
            tracing::trace!(%address, current_nonce = *nonce, "incrementing nonce");
            *nonce + 1
        };
        *nonce = new_nonce;
        Ok(new_nonce)
    }
}

impl PendingNonceManager {
    /// Resets the cached nonce for `address`, forcing a fresh `.pending()` query on next use.
    ///
    /// Call this when a transaction fails — the transaction may or may not have reached
    /// the mempool, so the local increment can no longer be trusted.
    pub async fn reset_nonce(&self, address: Address) {
        if let Some(nonce_lock) = self.nonces.get(&address) {
            let mut nonce = nonce_lock.lock().await;
            *nonce = u64::MAX;
            #[cfg(feature = "telemetry")]
            tracing::debug!(%address, "reset nonce cache, will requery on next use");
        }
    }
}

//! The `FacilitatorClient` contract: a remote-procedure façade exposing
//! `verify`, `settle`, and `supported`, implemented once locally (by the
//! facilitator process dispatching through a facilitator-role scheme
//! registry) and once as an HTTP stub (used by resource servers).

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;

use crate::proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

/// A facilitator-shaped client: verify and settle payments, and describe
/// what this facilitator supports.
///
/// `verify` MUST be idempotent and free of side effects. `settle` may have
/// on-chain side effects exactly once per unique payload, enforced at the
/// chain level (nonces) — this trait does not add process-local
/// deduplication on top of that.
pub trait FacilitatorClient {
    type Error: Debug + Display;

    fn verify(
        &self,
        request: VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    fn settle(
        &self,
        request: SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;

    fn supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send;
}

impl<T> FacilitatorClient for Arc<T>
where
    T: FacilitatorClient + Sync + Send,
{
    type Error = T::Error;

    fn verify(
        &self,
        request: VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        (**self).verify(request)
    }

    fn settle(
        &self,
        request: SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        (**self).settle(request)
    }

    fn supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send {
        (**self).supported()
    }
}

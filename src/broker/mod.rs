pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::AppResult;
use models::{
    EscrowCodeVerification, StartTransactionRequest, StartTransactionResponse,
    TransactionStatusResponse,
};

pub use client::PayscrowClient;

/// Outbound escrow broker API. The reconciler and the checkout path depend
/// on this seam so tests can substitute the broker.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    async fn start_transaction(
        &self,
        request: &StartTransactionRequest,
    ) -> AppResult<StartTransactionResponse>;

    /// Authoritative transaction state, queried by transaction number or
    /// transaction id.
    async fn get_transaction_status(
        &self,
        identifier: &str,
    ) -> AppResult<TransactionStatusResponse>;

    async fn verify_escrow_code(&self, code: &str) -> AppResult<EscrowCodeVerification>;

    async fn apply_escrow_code(
        &self,
        transaction_id: &str,
        code: &str,
    ) -> AppResult<TransactionStatusResponse>;
}

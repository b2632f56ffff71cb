//! Chain client adapter seam.
//!
//! Everything above this trait speaks typed contract calls; everything below it
//! speaks raw calldata. Signing is the responsibility of whatever sits behind
//! the implementation (an unlocked node account, a wallet bridge, the sandbox).

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use serde::Serialize;

use crate::types::ChainError;

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Execute a read-only call against `address` at the latest block.
    async fn read_contract(&self, address: Address, calldata: Bytes) -> Result<Bytes, ChainError>;

    /// Submit a state-changing call from `from`.
    ///
    /// `Ok(None)` means the submission was acknowledged but no transaction
    /// hash came back; callers must not assume the transaction exists.
    async fn write_contract(
        &self,
        from: Address,
        address: Address,
        calldata: Bytes,
    ) -> Result<Option<TxHash>, ChainError>;

    /// Wait until `tx` is mined. Unbounded; callers apply their own timeout.
    async fn wait_for_receipt(&self, tx: TxHash) -> Result<ReceiptStatus, ChainError>;
}

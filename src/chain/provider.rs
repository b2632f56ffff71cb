//! Chain client backed by an alloy provider
//!
//! Reads are `eth_call`s at the latest block. Writes are sent from the owner's
//! address and signed by whatever sits behind the provider (an unlocked node
//! account, a wallet filler or a wallet bridge).

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{PendingTransactionBuilder, Provider};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use super::client::{ChainClient, ReceiptStatus};
use crate::types::ChainError;

pub struct ProviderChainClient<P> {
    provider: P,
}

impl<P: Provider> ProviderChainClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> ChainClient for ProviderChainClient<P>
where
    P: Provider + Send + Sync + 'static,
{
    async fn read_contract(&self, address: Address, calldata: Bytes) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default()
            .to(address)
            .input(calldata.into());

        tracing::trace!(to = %address, "eth_call");
        Ok(self.provider.call(tx).await?)
    }

    async fn write_contract(
        &self,
        from: Address,
        address: Address,
        calldata: Bytes,
    ) -> Result<Option<TxHash>, ChainError> {
        let tx = TransactionRequest::default()
            .from(from)
            .to(address)
            .input(calldata.into());

        let pending = self.provider.send_transaction(tx).await?;
        Ok(Some(*pending.tx_hash()))
    }

    async fn wait_for_receipt(&self, tx: TxHash) -> Result<ReceiptStatus, ChainError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx)
            .get_receipt()
            .await?;

        Ok(if receipt.status() {
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Reverted
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::providers::ProviderBuilder;
    use alloy::transports::mock::Asserter;

    fn mocked(asserter: &Asserter) -> ProviderChainClient<impl Provider> {
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter.clone());
        ProviderChainClient::new(provider)
    }

    #[tokio::test]
    async fn test_read_returns_call_output() {
        let asserter = Asserter::new();
        let client = mocked(&asserter);
        let output = Bytes::from(vec![0xab; 32]);
        asserter.push_success(&output);

        let calldata = Bytes::from(vec![0xdd, 0x62, 0xed, 0x3e]);
        let data = client
            .read_contract(Address::repeat_byte(0x11), calldata)
            .await
            .unwrap();

        assert_eq!(data, output);
    }

    #[tokio::test]
    async fn test_node_error_maps_to_rpc_error() {
        let asserter = Asserter::new();
        let client = mocked(&asserter);
        asserter.push_failure_msg("execution reverted");

        let err = client
            .read_contract(Address::repeat_byte(0x11), Bytes::new())
            .await
            .unwrap_err();

        match err {
            ChainError::Rpc { message, .. } => assert!(message.contains("execution reverted")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

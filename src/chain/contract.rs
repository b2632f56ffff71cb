//! Typed bindings for the put-option contract and the USDC token

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;

use super::abi::{IPutOptions, IERC20};
use super::client::{ChainClient, ReceiptStatus};
use crate::options::params::NormalizedParams;
use crate::options::view::OptionView;
use crate::types::ChainError;

/// Raw `opts(index)` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionRecord {
    pub strike: U256,
    pub premium: U256,
    pub amount: U256,
    pub expiry: U256,
    pub seller: Address,
    pub buyer: Address,
    pub asset: Address,
    pub asset_sent: bool,
    pub fund_sent: bool,
}

impl OptionRecord {
    /// The zero buyer written by the contract means "not bought yet".
    pub fn into_view(self, id: u64) -> OptionView {
        OptionView {
            id,
            asset: Some(self.asset),
            amount: Some(self.amount),
            strike: self.strike,
            premium: self.premium,
            expiry: self.expiry.saturating_to::<u64>(),
            creator: self.seller,
            buyer: (!self.buyer.is_zero()).then_some(self.buyer),
            is_call: false,
            created_at: None,
            asset_delivered: Some(self.asset_sent),
            funds_delivered: Some(self.fund_sent),
        }
    }
}

/// Client for the option contract at a fixed address.
#[derive(Clone)]
pub struct OptionContract {
    client: Arc<dyn ChainClient>,
    address: Address,
}

impl OptionContract {
    pub fn new(client: Arc<dyn ChainClient>, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn call<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, ChainError> {
        let data = self
            .client
            .read_contract(to, Bytes::from(call.abi_encode()))
            .await?;
        Ok(C::abi_decode_returns(&data)?)
    }

    async fn send<C: SolCall>(
        &self,
        from: Address,
        to: Address,
        call: C,
    ) -> Result<Option<TxHash>, ChainError> {
        self.client
            .write_contract(from, to, Bytes::from(call.abi_encode()))
            .await
    }

    /// Quote token the contract settles in
    pub async fn usdc(&self) -> Result<Address, ChainError> {
        Ok(self.call(self.address, IPutOptions::usdcCall {}).await?)
    }

    pub async fn option_count(&self) -> Result<U256, ChainError> {
        Ok(self.call(self.address, IPutOptions::optCountCall {}).await?)
    }

    pub async fn option(&self, index: U256) -> Result<OptionRecord, ChainError> {
        let r = self
            .call(self.address, IPutOptions::optsCall { index })
            .await?;
        Ok(OptionRecord {
            strike: r.strike,
            premium: r.premium,
            amount: r.amount,
            expiry: r.expiry,
            seller: r.seller,
            buyer: r.buyer,
            asset: r.asset,
            asset_sent: r.assetSent,
            fund_sent: r.fundSent,
        })
    }

    /// `token.allowance(owner, <this contract>)`
    pub async fn allowance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let call = IERC20::allowanceCall {
            owner,
            spender: self.address,
        };
        Ok(self.call(token, call).await?)
    }

    /// `token.approve(<this contract>, amount)` sent from `owner`
    pub async fn approve(
        &self,
        owner: Address,
        token: Address,
        amount: U256,
    ) -> Result<Option<TxHash>, ChainError> {
        let call = IERC20::approveCall {
            spender: self.address,
            amount,
        };
        self.send(owner, token, call).await
    }

    pub async fn create_put_option(
        &self,
        owner: Address,
        params: &NormalizedParams,
    ) -> Result<Option<TxHash>, ChainError> {
        let call = IPutOptions::createPutOptCall {
            strike: params.strike,
            premium: params.premium,
            expiry: U256::from(params.expiry),
            asset: params.asset,
            amount: params.amount,
        };
        self.send(owner, self.address, call).await
    }

    pub async fn wait_for_receipt(&self, tx: TxHash) -> Result<ReceiptStatus, ChainError> {
        self.client.wait_for_receipt(tx).await
    }
}

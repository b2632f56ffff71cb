//! Allowance gate
//!
//! Tracks the USDC allowance the connected owner has granted the option
//! contract. Only the last successfully fetched value is kept.

use alloy::primitives::{Address, U256};

use super::contract::OptionContract;
use crate::types::ChainError;

pub struct AllowanceGate {
    contract: OptionContract,
    token: Address,
    owner: Option<Address>,
    last: Option<U256>,
}

impl AllowanceGate {
    pub fn new(contract: OptionContract, token: Address, owner: Option<Address>) -> Self {
        Self {
            contract,
            token,
            owner,
            last: None,
        }
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn token(&self) -> Address {
        self.token
    }

    /// Last fetched allowance, reading through to the chain if nothing has
    /// been fetched yet.
    pub async fn current_allowance(&mut self) -> Result<U256, ChainError> {
        match self.last {
            Some(value) => Ok(value),
            None => self.force_refresh().await,
        }
    }

    /// Read the allowance from the chain, ignoring the cached value.
    ///
    /// Without a connected owner nothing is read and zero is returned. A
    /// failed read leaves the cached value untouched.
    pub async fn force_refresh(&mut self) -> Result<U256, ChainError> {
        let Some(owner) = self.owner else {
            return Ok(U256::ZERO);
        };

        let value = self.contract.allowance(self.token, owner).await?;
        tracing::debug!(
            token = %self.token,
            owner = %owner,
            allowance = %value,
            "Allowance refreshed"
        );
        self.last = Some(value);
        Ok(value)
    }

    /// Whether an approval is needed before spending `required`.
    pub fn needs_approval(current: U256, required: U256) -> bool {
        current < required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxChain;
    use std::sync::Arc;

    fn setup(owner: Option<Address>) -> (Arc<SandboxChain>, AllowanceGate) {
        let chain = Arc::new(SandboxChain::new());
        let contract = OptionContract::new(chain.clone(), chain.option_contract());
        let gate = AllowanceGate::new(contract, chain.usdc(), owner);
        (chain, gate)
    }

    #[tokio::test]
    async fn test_no_owner_skips_read() {
        let (chain, mut gate) = setup(None);

        assert_eq!(gate.force_refresh().await.unwrap(), U256::ZERO);
        assert_eq!(gate.current_allowance().await.unwrap(), U256::ZERO);
        assert_eq!(chain.stats().allowance_reads, 0);
    }

    #[tokio::test]
    async fn test_current_allowance_reads_through_once() {
        let owner = Address::repeat_byte(0x0a);
        let (chain, mut gate) = setup(Some(owner));
        chain.set_allowance(owner, U256::from(150u64));

        assert_eq!(gate.current_allowance().await.unwrap(), U256::from(150u64));
        assert_eq!(gate.current_allowance().await.unwrap(), U256::from(150u64));
        assert_eq!(chain.stats().allowance_reads, 1);

        chain.set_allowance(owner, U256::from(10u64));
        assert_eq!(gate.force_refresh().await.unwrap(), U256::from(10u64));
        assert_eq!(chain.stats().allowance_reads, 2);
    }

    #[tokio::test]
    async fn test_failed_read_is_not_zero() {
        let owner = Address::repeat_byte(0x0a);
        let (chain, mut gate) = setup(Some(owner));
        chain.set_allowance(owner, U256::from(150u64));
        gate.force_refresh().await.unwrap();

        chain.fail_allowance_reads(1);
        assert!(gate.force_refresh().await.is_err());
        // the cached value survives the failure
        assert_eq!(gate.current_allowance().await.unwrap(), U256::from(150u64));
    }

    #[test]
    fn test_needs_approval() {
        assert!(AllowanceGate::needs_approval(U256::ZERO, U256::from(1u64)));
        assert!(!AllowanceGate::needs_approval(U256::from(5u64), U256::from(5u64)));
    }
}

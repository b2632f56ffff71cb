//! Listings read straight from the option contract

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use super::{IndexerError, OptionSource};
use crate::chain::OptionContract;
use crate::options::OptionView;

/// Enumerates `opts(0..optCount)`. The contract has no "active" flag, so every
/// record is returned and expiry is left to the caller.
#[derive(Clone)]
pub struct ChainOptionSource {
    contract: OptionContract,
}

impl ChainOptionSource {
    pub fn new(contract: OptionContract) -> Self {
        Self { contract }
    }

    async fn all(&self) -> Result<Vec<OptionView>, IndexerError> {
        let count = self.contract.option_count().await?;
        let count = u64::try_from(count).map_err(|_| {
            IndexerError::MalformedRecord(format!("optCount {} does not fit in u64", count))
        })?;

        let mut options = Vec::with_capacity(count as usize);
        for id in (0..count).rev() {
            let record = self.contract.option(U256::from(id)).await?;
            options.push(record.into_view(id));
        }

        tracing::debug!(count, "Read options from chain");
        Ok(options)
    }
}

#[async_trait]
impl OptionSource for ChainOptionSource {
    async fn active_options(&self) -> Result<Vec<OptionView>, IndexerError> {
        self.all().await
    }

    async fn options_created_by(&self, creator: Address) -> Result<Vec<OptionView>, IndexerError> {
        let mut options = self.all().await?;
        options.retain(|o| o.creator == creator);
        Ok(options)
    }

    async fn options_by_strike(
        &self,
        min: U256,
        max: U256,
    ) -> Result<Vec<OptionView>, IndexerError> {
        let mut options = self.all().await?;
        options.retain(|o| o.strike >= min && o.strike <= max);
        options.sort_by_key(|o| o.expiry);
        Ok(options)
    }
}

//! Option listings
//!
//! Two interchangeable sources: the subgraph (eventually consistent, carries
//! `isCall`/`createdAt`) and the option contract itself (authoritative, carries
//! the buyer and settlement flags).

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod chain;
pub mod subgraph;

pub use chain::ChainOptionSource;
pub use subgraph::SubgraphClient;

use crate::options::OptionView;
use crate::types::{ApiError, ChainError};

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("indexer transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("graphql errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("malformed option record: {0}")]
    MalformedRecord(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

/// Where listings are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Chain,
    Indexer,
}

#[async_trait]
pub trait OptionSource: Send + Sync {
    /// Every live option, newest first
    async fn active_options(&self) -> Result<Vec<OptionView>, IndexerError>;

    async fn options_created_by(&self, creator: Address) -> Result<Vec<OptionView>, IndexerError>;

    /// Options with `min <= strike <= max`, soonest expiry first
    async fn options_by_strike(&self, min: U256, max: U256)
        -> Result<Vec<OptionView>, IndexerError>;
}

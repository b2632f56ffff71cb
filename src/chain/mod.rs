//! EVM chain access
//!
//! - `client`: the adapter trait the rest of the crate depends on
//! - `provider`: the adapter over an alloy provider
//! - `abi` / `contract`: typed calls for the option contract and USDC
//! - `allowance`: the allowance gate used by the create-option workflow

pub mod abi;
pub mod allowance;
pub mod client;
pub mod contract;
pub mod provider;

pub use allowance::AllowanceGate;
pub use client::{ChainClient, ReceiptStatus};
pub use contract::{OptionContract, OptionRecord};
pub use provider::ProviderChainClient;

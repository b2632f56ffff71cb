//! Chain sandbox
//!
//! Simulated USDC + put-option contract used when no RPC endpoint is
//! configured, and by the test suite and demo. Handles:
//! - USDC allowances keyed by (owner, option contract)
//! - Delayed inclusion of approvals, driven by allowance reads or receipts
//! - `createPutOpt` with the contract's strike-only allowance check
//! - Fault injection for every step of the create-option workflow

pub mod chain;

pub use chain::{SandboxChain, SandboxStats, DEFAULT_OPTION_CONTRACT, SANDBOX_USDC};

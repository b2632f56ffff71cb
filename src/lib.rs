//! Hedgehog put option backend
//!
//! Allowance-then-create workflow for the put option contract, option
//! listings from the chain or the subgraph, and the HTTP API around them.

pub mod api;
pub mod chain;
pub mod config;
pub mod indexer;
pub mod options;
pub mod sandbox;
pub mod types;
pub mod workflow;

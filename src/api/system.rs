//! Service configuration endpoint.

use alloy::primitives::Address;
use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::workflow::ConfirmationMode;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub option_contract: Address,
    pub usdc: Address,
    /// `sandbox` or `rpc`
    pub chain: &'static str,
    pub subgraph: bool,
    pub confirmation: ConfirmationMode,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
}

/// GET /api/config - Contract addresses and confirmation policy
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let policy = state.config.confirmation;
    Json(ConfigResponse {
        option_contract: state.contract.address(),
        usdc: state.usdc,
        chain: if state.config.uses_sandbox() {
            "sandbox"
        } else {
            "rpc"
        },
        subgraph: state.subgraph.is_some(),
        confirmation: policy.mode,
        poll_interval_ms: policy.interval.as_millis() as u64,
        max_poll_attempts: policy.max_attempts,
    })
}

//! Raw option contract reads

use alloy::primitives::{Address, U256};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::api::AppState;
use crate::chain::OptionRecord;
use crate::types::ApiResult;

#[derive(Debug, Serialize)]
pub struct ContractResponse {
    pub address: Address,
    pub usdc: Address,
    pub option_count: U256,
}

#[derive(Debug, Serialize)]
pub struct OptionRecordResponse {
    pub index: u64,
    pub record: OptionRecord,
}

/// GET /api/contract - `usdc()` and `optCount()`
pub async fn get_contract(State(state): State<AppState>) -> ApiResult<Json<ContractResponse>> {
    let usdc = state.contract.usdc().await?;
    let option_count = state.contract.option_count().await?;

    Ok(Json(ContractResponse {
        address: state.contract.address(),
        usdc,
        option_count,
    }))
}

/// GET /api/contract/options/:index - `opts(index)` as stored
pub async fn get_option(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> ApiResult<Json<OptionRecordResponse>> {
    let record = state.contract.option(U256::from(index)).await?;
    Ok(Json(OptionRecordResponse { index, record }))
}

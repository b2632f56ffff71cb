//! Option listing endpoints

use alloy::primitives::{Address, U256};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::indexer::SourceKind;
use crate::options::params::{
    format_units, parse_address, parse_units, ASSET_DECIMALS, QUOTE_DECIMALS,
};
use crate::options::{partition, OptionView};
use crate::types::{unix_now, ApiError, ApiResult};
use crate::workflow;

/// Option with amounts rendered as decimal strings
#[derive(Debug, Serialize)]
pub struct OptionInfo {
    pub id: u64,
    pub asset: Option<Address>,
    pub amount: Option<String>,
    pub strike: String,
    pub premium: String,
    pub expiry: u64,
    pub expired: bool,
    pub creator: Address,
    pub buyer: Option<Address>,
    pub is_call: bool,
    pub created_at: Option<u64>,
    pub asset_delivered: Option<bool>,
    pub funds_delivered: Option<bool>,
}

impl OptionInfo {
    fn new(view: OptionView, now: u64) -> Self {
        Self {
            expired: view.is_expired(now),
            id: view.id,
            asset: view.asset,
            amount: view.amount.map(|a| format_units(a, ASSET_DECIMALS)),
            strike: format_units(view.strike, QUOTE_DECIMALS),
            premium: format_units(view.premium, QUOTE_DECIMALS),
            expiry: view.expiry,
            creator: view.creator,
            buyer: view.buyer,
            is_call: view.is_call,
            created_at: view.created_at,
            asset_delivered: view.asset_delivered,
            funds_delivered: view.funds_delivered,
        }
    }
}

fn infos(views: Vec<OptionView>, now: u64) -> Vec<OptionInfo> {
    views.into_iter().map(|v| OptionInfo::new(v, now)).collect()
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub viewer: Option<String>,
    #[serde(default)]
    pub source: SourceKind,
}

#[derive(Debug, Serialize)]
pub struct PartitionResponse {
    pub source: SourceKind,
    pub viewer: Option<Address>,
    pub available: Vec<OptionInfo>,
    pub owned: Vec<OptionInfo>,
}

#[derive(Debug, Deserialize)]
pub struct StrikeQuery {
    /// USDC, inclusive
    pub min: Option<String>,
    pub max: Option<String>,
    #[serde(default)]
    pub source: SourceKind,
}

#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    #[serde(default)]
    pub source: SourceKind,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub source: SourceKind,
    pub count: usize,
    pub options: Vec<OptionInfo>,
}

fn bad_request(e: impl ToString) -> ApiError {
    ApiError::BadRequest(e.to_string())
}

/// GET /api/options - Available and owned options for a viewer
pub async fn list_options(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PartitionResponse>> {
    let viewer = query
        .viewer
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_address("viewer", v))
        .transpose()
        .map_err(bad_request)?;

    let options = state.source(query.source)?.active_options().await?;
    let now = unix_now();
    let split = partition(options, viewer, now);

    tracing::debug!(
        source = ?query.source,
        available = split.available.len(),
        owned = split.owned.len(),
        "Options partitioned"
    );

    Ok(Json(PartitionResponse {
        source: query.source,
        viewer,
        available: infos(split.available, now),
        owned: infos(split.owned, now),
    }))
}

/// GET /api/options/by-strike - Options within a strike range
pub async fn options_by_strike(
    State(state): State<AppState>,
    Query(query): Query<StrikeQuery>,
) -> ApiResult<Json<ListResponse>> {
    let min = match query.min.as_deref() {
        Some(v) => parse_units("min", v, QUOTE_DECIMALS).map_err(bad_request)?,
        None => U256::ZERO,
    };
    let max = match query.max.as_deref() {
        Some(v) => parse_units("max", v, QUOTE_DECIMALS).map_err(bad_request)?,
        None => U256::MAX,
    };
    if min > max {
        return Err(ApiError::BadRequest("min must not exceed max".into()));
    }

    let options = state
        .source(query.source)?
        .options_by_strike(min, max)
        .await?;

    Ok(Json(ListResponse {
        source: query.source,
        count: options.len(),
        options: infos(options, unix_now()),
    }))
}

/// GET /api/options/created/:address - Options written by an address
pub async fn options_created_by(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<SourceQuery>,
) -> ApiResult<Json<ListResponse>> {
    let creator = parse_address("address", &address).map_err(bad_request)?;
    let options = state
        .source(query.source)?
        .options_created_by(creator)
        .await?;

    Ok(Json(ListResponse {
        source: query.source,
        count: options.len(),
        options: infos(options, unix_now()),
    }))
}

/// POST /api/options/:id/buy
pub async fn buy_option(Path(id): Path<u64>) -> ApiResult<Json<()>> {
    workflow::buy_option(id).await?;
    Ok(Json(()))
}

/// POST /api/options/:id/claim
pub async fn claim_option(Path(id): Path<u64>) -> ApiResult<Json<()>> {
    workflow::claim_option(id).await?;
    Ok(Json(()))
}

//! API endpoints for the put option service

use alloy::primitives::Address;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

mod contract;
mod options;
mod session;
mod system;

use crate::chain::OptionContract;
use crate::config::AppConfig;
use crate::indexer::{ChainOptionSource, OptionSource, SourceKind, SubgraphClient};
use crate::types::{ApiError, ApiResult};
use crate::workflow::SessionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub contract: OptionContract,
    /// Resolved at startup, from config or the contract's `usdc()`
    pub usdc: Address,
    pub session_manager: Arc<SessionManager>,
    pub chain_source: Arc<ChainOptionSource>,
    pub subgraph: Option<Arc<SubgraphClient>>,
}

impl AppState {
    pub fn new(config: AppConfig, contract: OptionContract, usdc: Address) -> Self {
        let session_manager = Arc::new(SessionManager::new(
            contract.clone(),
            usdc,
            config.confirmation,
        ));
        let chain_source = Arc::new(ChainOptionSource::new(contract.clone()));
        let subgraph = config
            .subgraph_url
            .as_ref()
            .map(|url| Arc::new(SubgraphClient::new(url.clone())));

        Self {
            config: Arc::new(config),
            contract,
            usdc,
            session_manager,
            chain_source,
            subgraph,
        }
    }

    /// Listing source for `kind`
    pub fn source(&self, kind: SourceKind) -> ApiResult<Arc<dyn OptionSource>> {
        match kind {
            SourceKind::Chain => Ok(self.chain_source.clone() as Arc<dyn OptionSource>),
            SourceKind::Indexer => self
                .subgraph
                .clone()
                .map(|s| s as Arc<dyn OptionSource>)
                .ok_or_else(|| ApiError::BadRequest("no subgraph is configured".into())),
        }
    }
}

/// Create the API router with all endpoints
pub fn router(app_state: AppState) -> Router {
    Router::new()
        // Service configuration
        .route("/config", get(system::get_config))
        // Create-option sessions
        .route("/session", post(session::create_session))
        .route(
            "/session/:id",
            get(session::get_session).delete(session::delete_session),
        )
        .route("/session/:id/submit", post(session::submit))
        .route("/session/:id/recheck", post(session::recheck))
        // Listings (supports ?source=chain|indexer)
        .route("/options", get(options::list_options))
        .route("/options/by-strike", get(options::options_by_strike))
        .route("/options/created/:address", get(options::options_created_by))
        .route("/options/:id/buy", post(options::buy_option))
        .route("/options/:id/claim", post(options::claim_option))
        // Raw contract reads
        .route("/contract", get(contract::get_contract))
        .route("/contract/options/:index", get(contract::get_option))
        .with_state(app_state)
}

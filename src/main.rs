//! Hedgehog Backend
//!
//! HTTP API server for creating put options. Talks to an Ethereum node when
//! `HEDGEHOG_RPC_URL` is set, otherwise to the in-process sandbox chain.

use std::sync::Arc;

use alloy::providers::ProviderBuilder;
use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hedgehog_backend::api::{self, AppState};
use hedgehog_backend::chain::{ChainClient, OptionContract, ProviderChainClient};
use hedgehog_backend::config::AppConfig;
use hedgehog_backend::sandbox::SandboxChain;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    let client: Arc<dyn ChainClient> = match &config.rpc_url {
        Some(url) => {
            tracing::info!("Using chain RPC at {}", url);
            let endpoint = url
                .parse::<reqwest::Url>()
                .with_context(|| format!("Invalid HEDGEHOG_RPC_URL: {}", url))?;
            let provider = ProviderBuilder::new().connect_http(endpoint);
            Arc::new(ProviderChainClient::new(provider))
        }
        None => {
            tracing::warn!(
                "HEDGEHOG_RPC_URL not set - using sandbox chain ({} reads per inclusion)",
                config.sandbox_inclusion_reads
            );
            Arc::new(SandboxChain::with_contract(
                config.option_contract,
                config.sandbox_inclusion_reads,
            ))
        }
    };

    let contract = OptionContract::new(client, config.option_contract);

    // USDC comes from the contract unless overridden
    let usdc = match config.usdc_address {
        Some(address) => address,
        None => contract
            .usdc()
            .await
            .context("Failed to read usdc() from the option contract")?,
    };
    tracing::info!(
        contract = %config.option_contract,
        usdc = %usdc,
        confirmation = ?config.confirmation.mode,
        "Option contract ready"
    );

    if let Some(url) = &config.subgraph_url {
        tracing::info!("Subgraph listings enabled: {}", url);
    }

    let addr = config.bind_addr;
    let app_state = AppState::new(config, contract, usdc);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api::router(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    tracing::info!("Starting server on {}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET    /health                       - Health check");
    tracing::info!("  GET    /api/config                   - Contract and confirmation policy");
    tracing::info!("  POST   /api/session                  - Mount a create-option session");
    tracing::info!("  GET    /api/session/:id              - Workflow status");
    tracing::info!("  POST   /api/session/:id/submit       - Submit the option form");
    tracing::info!("  POST   /api/session/:id/recheck      - Re-read the allowance");
    tracing::info!("  DELETE /api/session/:id              - End a session");
    tracing::info!("  GET    /api/options                  - Available and owned options");
    tracing::info!("  GET    /api/options/by-strike        - Options by strike range");
    tracing::info!("  GET    /api/options/created/:address - Options written by an address");
    tracing::info!("  GET    /api/contract                 - usdc() and optCount()");
    tracing::info!("  GET    /api/contract/options/:index  - Raw opts(index)");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

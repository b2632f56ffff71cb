//! Create-put-option walkthrough against the sandbox chain
//!
//! Runs three sessions end to end:
//! - A: no allowance, approval lands on the third poll, option created
//! - B: allowance already sufficient, approval skipped
//! - C: approval never lands, workflow times out back to `ready`
//!
//! Run with: cargo run --example create_put_option

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hedgehog_backend::chain::OptionContract;
use hedgehog_backend::options::params::{format_units, QUOTE_DECIMALS};
use hedgehog_backend::options::OptionForm;
use hedgehog_backend::sandbox::SandboxChain;
use hedgehog_backend::workflow::{ConfirmationMode, ConfirmationPolicy, CreateOptionWorkflow};

fn form() -> OptionForm {
    OptionForm {
        asset_address: "0x4242424242424242424242424242424242424242".into(),
        amount: "1".into(),
        strike_price: "100".into(),
        premium_price: "5".into(),
        expiration_date: "2099-12-31".into(),
    }
}

async fn run(name: &str, chain: Arc<SandboxChain>, owner: Address) -> anyhow::Result<()> {
    println!("\n=== Scenario {} ===", name);

    let contract = OptionContract::new(chain.clone(), chain.option_contract());
    let policy = ConfirmationPolicy {
        mode: ConfirmationMode::Poll,
        interval: Duration::from_millis(100),
        max_attempts: 30,
    };
    let mut workflow = CreateOptionWorkflow::new(contract, chain.usdc(), Some(owner), policy);

    let mut rx = workflow.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            println!("  [{:?}] {}", status.state, status.label);
        }
    });

    let allowance = workflow.check().await;
    println!(
        "  initial allowance: {}",
        allowance
            .map(|a| format_units(a, QUOTE_DECIMALS))
            .unwrap_or_else(|| "unknown".into())
    );

    match workflow.submit(&form()).await {
        Ok(tx) => println!("  created: {}", tx),
        Err(e) => println!("  failed: {}", e),
    }

    drop(workflow);
    printer.await?;

    let stats = chain.stats();
    println!(
        "  reads={} approvals={:?} creates={}",
        stats.allowance_reads, stats.approvals, stats.creates
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let owner = Address::repeat_byte(0x0a);

    run("A", Arc::new(SandboxChain::with_inclusion_reads(3)), owner).await?;

    let chain = Arc::new(SandboxChain::new());
    chain.set_allowance(owner, U256::from(150_000_000u64));
    run("B", chain, owner).await?;

    let chain = Arc::new(SandboxChain::with_inclusion_reads(1));
    chain.hold_approvals(true);
    run("C", chain, owner).await?;

    Ok(())
}

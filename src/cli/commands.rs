//! CLI command implementations

use anyhow::Result;
use dialoguer::Confirm;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::eth::{HttpProvider, WalletProvider};
use crate::sync::{LedgerSync, TransferDraft};

fn build_provider(config: &Config) -> Result<Arc<dyn WalletProvider>> {
    let provider = HttpProvider::new(
        &config.rpc.endpoint,
        Duration::from_millis(config.rpc.timeout_ms),
    )?;
    Ok(Arc::new(provider))
}

async fn build_sync(config: &Config) -> Result<LedgerSync> {
    let provider = build_provider(config)?;
    Ok(LedgerSync::new(config, Some(provider)).await?)
}

/// Run the synchronizer until interrupted
pub async fn start(config: &Config) -> Result<()> {
    info!("starting synchronizer");
    info!(
        "contract {} on chain {}",
        config.contract.address, config.chain.expected_chain_id
    );

    let mut sync = build_sync(config).await?;
    sync.start().await?;

    let snapshot = sync.snapshot().await;
    match &snapshot.current_account {
        Some(account) => info!("session restored for {}", account),
        None => info!("no authorized account; transfers disabled until one connects"),
    }
    info!("{} transactions in view", snapshot.transactions.len());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    sync.shutdown();
    Ok(())
}

/// Submit one transfer
pub async fn send(
    config: &Config,
    to: String,
    amount: String,
    keyword: String,
    message: String,
    yes: bool,
) -> Result<()> {
    let mut sync = build_sync(config).await?;
    sync.start().await?;

    if sync.snapshot().await.current_account.is_none() {
        info!("no restored session, requesting wallet authorization");
        if sync.connect().await?.is_none() {
            anyhow::bail!("wallet authorization denied");
        }
    }

    let draft = TransferDraft {
        receiver: to,
        amount,
        keyword,
        message,
    };
    sync.set_draft(draft.clone()).await;

    if !yes {
        let prompt = format!("Send {} ether to {}?", draft.amount, draft.receiver);
        if !Confirm::new().with_prompt(prompt).interact()? {
            warn!("transfer cancelled");
            return Ok(());
        }
    }

    let tx_hash = match sync.submit_transfer(&draft).await {
        Ok(hash) => hash,
        Err(e) if e.is_user_actionable() => {
            anyhow::bail!("transfer needs action on your side: {e}")
        }
        Err(e) if e.is_retryable() => {
            anyhow::bail!("transfer hit a transient RPC failure, retry the command: {e}")
        }
        Err(e) => return Err(e.into()),
    };
    println!("transfer submitted: {tx_hash}");

    let snapshot = sync.snapshot().await;
    println!("ledger now holds {} transactions", snapshot.transaction_count);

    sync.shutdown();
    Ok(())
}

/// Print the transaction view, newest first
pub async fn transactions(config: &Config, limit: usize) -> Result<()> {
    let mut sync = build_sync(config).await?;
    sync.start().await?;
    sync.refresh().await;

    let snapshot = sync.snapshot().await;
    if snapshot.transactions.is_empty() {
        println!("no transactions observed yet");
    }

    for record in snapshot.transactions.iter().take(limit) {
        println!(
            "{}  {} -> {}  {} ether  [{}] {}",
            record.timestamp_display(),
            record.sender,
            record.receiver,
            record.amount_display(),
            record.keyword,
            record.message,
        );
    }

    sync.shutdown();
    Ok(())
}

/// Print the cached transaction count
pub async fn count(config: &Config) -> Result<()> {
    let sync = build_sync(config).await?;
    let snapshot = sync.snapshot().await;
    println!("{}", snapshot.transaction_count);
    Ok(())
}

/// Print the resolved configuration
pub async fn show_config(config: &Config) -> Result<()> {
    println!("{config:#?}");
    Ok(())
}

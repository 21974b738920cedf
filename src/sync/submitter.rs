//! Transfer submitter
//!
//! Mediates a user-initiated transfer: moves value through the wallet, then
//! records the transfer in the ledger contract, then converges the cache.
//! The two on-chain calls are not atomic with each other: a failure between
//! them leaves value moved but unrecorded. That is a property of the
//! two-call protocol and is kept as-is rather than papered over by
//! reordering.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::is_hex_address;
use crate::error::{Error, Result};
use crate::eth::{provider, units, TransactionRequest, WalletProvider};
use crate::ledger::{LedgerStore, TransactionLedger};

use super::fetcher::LedgerFetcher;
use super::guard::NetworkGuard;
use super::session::{SubmitPhase, TransferDraft};
use super::SharedState;

pub struct TransferSubmitter {
    provider: Arc<dyn WalletProvider>,
    ledger: Arc<dyn TransactionLedger>,
    guard: NetworkGuard,
    store: LedgerStore,
    fetcher: Arc<LedgerFetcher>,
    state: Arc<SharedState>,
    transfer_gas: u64,
}

impl TransferSubmitter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        ledger: Arc<dyn TransactionLedger>,
        guard: NetworkGuard,
        store: LedgerStore,
        fetcher: Arc<LedgerFetcher>,
        state: Arc<SharedState>,
        transfer_gas: u64,
    ) -> Self {
        Self {
            provider,
            ledger,
            guard,
            store,
            fetcher,
            state,
            transfer_gas,
        }
    }

    /// Submit one transfer end to end, returning the value-transfer tx hash
    ///
    /// Whatever happens, the phase is back at Idle when this returns; a
    /// failure at any step applies no later step.
    pub async fn submit_transfer(&self, draft: &TransferDraft) -> Result<String> {
        let result = self.run(draft).await;
        self.set_phase(SubmitPhase::Idle).await;

        match &result {
            Ok(tx_hash) => info!("transfer complete: {}", tx_hash),
            Err(e) => warn!("transfer failed: {}", e),
        }
        result
    }

    async fn run(&self, draft: &TransferDraft) -> Result<String> {
        // The guard runs before the phase leaves Idle: a wrong network must
        // not flicker is_submitting
        if !self.guard.ensure_expected_network().await {
            return Err(Error::WrongNetwork {
                expected: self.guard.expected_chain_id().to_string(),
            });
        }

        self.set_phase(SubmitPhase::Guarding).await;
        let amount_wei = units::parse_ether(&draft.amount)?;
        if !is_hex_address(&draft.receiver) {
            return Err(Error::Validation(format!(
                "receiver {:?} is not a valid address",
                draft.receiver
            )));
        }
        let from = self
            .state
            .session
            .read()
            .await
            .current_account
            .clone()
            .ok_or(Error::NotConnected)?;

        // Step one: move the value through the wallet
        self.set_phase(SubmitPhase::Transferring).await;
        let request =
            TransactionRequest::value_transfer(&from, &draft.receiver, self.transfer_gas, amount_wei);
        let tx_hash = provider::send_transaction(&*self.provider, &request).await?;
        info!("value transfer submitted: {}", tx_hash);

        // Step two: record it in the ledger contract and wait for inclusion
        self.set_phase(SubmitPhase::Recording).await;
        let pending = self
            .ledger
            .record_transfer(
                &from,
                &draft.receiver,
                amount_wei,
                &draft.message,
                &draft.keyword,
            )
            .await?;
        pending.wait().await?;

        // Converge: fresh count, then a full refetch
        self.set_phase(SubmitPhase::Refreshing).await;
        let count = self.ledger.transaction_count().await?;
        self.store.save_count(count).await?;
        *self.state.transaction_count.write().await = count;

        self.fetcher.refresh_transactions().await;
        Ok(tx_hash)
    }

    async fn set_phase(&self, phase: SubmitPhase) {
        self.state.session.write().await.phase = phase;
    }
}

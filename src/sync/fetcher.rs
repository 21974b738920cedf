//! Ledger fetcher
//!
//! Pulls the full transaction set from the contract and replaces the cache
//! with it. There is no incremental merge: every successful fetch is a
//! complete snapshot, so the cache is only ever stale or fresh. On any
//! failure the previous snapshot is kept untouched.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ledger::{LedgerStore, TransactionLedger, TransferRecord};

use super::SharedState;

pub struct LedgerFetcher {
    ledger: Option<Arc<dyn TransactionLedger>>,
    store: LedgerStore,
    state: Arc<SharedState>,
}

impl LedgerFetcher {
    pub fn new(
        ledger: Option<Arc<dyn TransactionLedger>>,
        store: LedgerStore,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            ledger,
            store,
            state,
        }
    }

    /// Refetch the full ledger and replace the cache
    ///
    /// A missing provider is a benign absence, not an error. Failures are
    /// logged and leave both the durable and the in-memory snapshot at
    /// their last known-good value; callers may simply re-invoke.
    pub async fn refresh_transactions(&self) {
        let Some(ledger) = &self.ledger else {
            debug!("no wallet provider, skipping ledger refresh");
            return;
        };

        if let Err(e) = self.refresh(ledger.as_ref()).await {
            warn!("ledger refresh failed, keeping cached view: {}", e);
        }
    }

    async fn refresh(&self, ledger: &dyn TransactionLedger) -> Result<()> {
        let raw = ledger.all_transactions().await?;
        let records: Vec<TransferRecord> = raw.into_iter().map(Into::into).collect();

        // Persist first: the durable snapshot must never lag the visible one
        self.store.save_transactions(&records).await?;

        let mut view = self.state.transactions.write().await;
        *view = records;
        info!("ledger refreshed: {} transactions", view.len());
        Ok(())
    }
}

//! Reconciliation core
//!
//! Keeps three sources of truth consistent: the on-chain contract state,
//! the durable local cache, and live push events. `LedgerSync` wires the
//! components together and owns the session lifecycle; the cache is the
//! first-paint source before any network round trip, and every network
//! refresh is a full replacement that converges on the contract.

pub mod events;
pub mod fetcher;
pub mod guard;
pub mod session;
pub mod submitter;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::eth::WalletProvider;
use crate::ledger::{LedgerStore, RpcLedger, TransactionLedger, TransferRecord};

pub use events::{EventSubscriber, SubscriptionHandle};
pub use fetcher::LedgerFetcher;
pub use guard::NetworkGuard;
pub use session::{AccountSession, SessionState, SubmitPhase, TransferDraft};
pub use submitter::TransferSubmitter;

/// State shared across the components
///
/// Single-writer discipline by convention: `current_account` is written by
/// the account session, `phase` by the submitter, the two ledger views by
/// the fetcher and submitter. Concurrent refetches race only on which full
/// snapshot lands last, and both converge on the same source.
pub struct SharedState {
    pub session: RwLock<SessionState>,
    pub transactions: RwLock<Vec<TransferRecord>>,
    pub transaction_count: RwLock<u64>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            session: RwLock::new(SessionState::default()),
            transactions: RwLock::new(Vec::new()),
            transaction_count: RwLock::new(0),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the display surface consumes, in display order
#[derive(Debug, Clone)]
pub struct DisplaySnapshot {
    /// Newest first
    pub transactions: Vec<TransferRecord>,
    pub current_account: Option<String>,
    pub is_submitting: bool,
    pub transaction_count: u64,
}

/// The synchronizer: session, fetcher, subscriber and submitter over one
/// contract, one wallet, one cache
pub struct LedgerSync {
    state: Arc<SharedState>,
    session: AccountSession,
    fetcher: Arc<LedgerFetcher>,
    submitter: Option<TransferSubmitter>,
    ledger: Option<Arc<dyn TransactionLedger>>,
    subscription: Option<SubscriptionHandle>,
}

impl LedgerSync {
    /// Build the synchronizer over an optional wallet provider
    ///
    /// `provider: None` models the wallet-not-installed case: the cached
    /// view still loads, every network-facing operation degrades per its
    /// own contract.
    pub async fn new(config: &Config, provider: Option<Arc<dyn WalletProvider>>) -> Result<Self> {
        let ledger = provider
            .clone()
            .map(|p| Arc::new(RpcLedger::new(p, &config.contract)) as Arc<dyn TransactionLedger>);
        Self::with_ledger(config, provider, ledger).await
    }

    /// Build with an explicit ledger implementation (tests, other transports)
    pub async fn with_ledger(
        config: &Config,
        provider: Option<Arc<dyn WalletProvider>>,
        ledger: Option<Arc<dyn TransactionLedger>>,
    ) -> Result<Self> {
        let store = LedgerStore::open(&config.storage.dir)?;
        let state = Arc::new(SharedState::new());

        // First paint from the durable cache, before any network round trip.
        // A corrupt slot degrades to an empty view rather than failing startup.
        match store.load_transactions().await {
            Ok(Some(cached)) => {
                info!("loaded {} cached transactions", cached.len());
                *state.transactions.write().await = cached;
            }
            Ok(None) => {}
            Err(e) => warn!("ignoring unreadable transaction cache: {}", e),
        }
        match store.load_count().await {
            Ok(Some(count)) => *state.transaction_count.write().await = count,
            Ok(None) => {}
            Err(e) => warn!("ignoring unreadable count cache: {}", e),
        }

        let fetcher = Arc::new(LedgerFetcher::new(
            ledger.clone(),
            store.clone(),
            state.clone(),
        ));

        let session = AccountSession::new(
            provider.clone(),
            &config.chain.expected_chain_id,
            fetcher.clone(),
            state.clone(),
        );

        let submitter = match (provider, ledger.clone()) {
            (Some(provider), Some(ledger)) => Some(TransferSubmitter::new(
                provider.clone(),
                ledger,
                NetworkGuard::new(provider, &config.chain.expected_chain_id),
                store,
                fetcher.clone(),
                state.clone(),
                config.chain.transfer_gas,
            )),
            _ => None,
        };

        Ok(Self {
            state,
            session,
            fetcher,
            submitter,
            ledger,
            subscription: None,
        })
    }

    /// Start the session: restore authorization, attach the event subscriber
    pub async fn start(&mut self) -> Result<()> {
        self.session.restore().await?;

        if let Some(ledger) = &self.ledger {
            self.subscription =
                Some(EventSubscriber::attach(ledger.clone(), self.fetcher.clone()).await?);
        }
        Ok(())
    }

    /// Detach the event subscriber; the session state dies with the value
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.detach();
        }
    }

    /// Actively request wallet authorization (may prompt the user)
    pub async fn connect(&self) -> Result<Option<String>> {
        self.session.connect().await
    }

    /// Force a full refetch of the ledger
    pub async fn refresh(&self) {
        self.fetcher.refresh_transactions().await;
    }

    /// Submit a transfer; fails with ProviderAbsent when no wallet exists
    pub async fn submit_transfer(&self, draft: &TransferDraft) -> Result<String> {
        match &self.submitter {
            Some(submitter) => submitter.submit_transfer(draft).await,
            None => Err(Error::ProviderAbsent),
        }
    }

    /// Stage transfer inputs pending validation
    pub async fn set_draft(&self, draft: TransferDraft) {
        self.state.session.write().await.draft = draft;
    }

    pub async fn draft(&self) -> TransferDraft {
        self.state.session.read().await.draft.clone()
    }

    /// Current view for the display surface, newest transaction first
    pub async fn snapshot(&self) -> DisplaySnapshot {
        let session = self.state.session.read().await;
        let transactions = self.state.transactions.read().await;

        let mut display: Vec<TransferRecord> = transactions.clone();
        display.reverse();

        DisplaySnapshot {
            transactions: display,
            current_account: session.current_account.clone(),
            is_submitting: session.is_submitting(),
            transaction_count: *self.state.transaction_count.read().await,
        }
    }
}

impl Drop for LedgerSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainConfig, ContractConfig, RpcConfig, StorageConfig};
    use crate::sync::testutil::{raw_transfer, MockLedger, MockProvider};
    use tempfile::tempdir;

    const CHAIN: &str = "0xaa36a7";
    const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            rpc: RpcConfig::default(),
            chain: ChainConfig {
                expected_chain_id: CHAIN.to_string(),
                transfer_gas: 21_000,
            },
            contract: ContractConfig {
                address: "0x2ab407bd96b9b4c9d31595028e1a402d2c7ec1f1".to_string(),
                receipt_poll_interval_ms: 1,
                event_poll_interval_ms: 1,
            },
            storage: StorageConfig {
                dir: dir.to_string_lossy().into_owned(),
            },
        }
    }

    #[tokio::test]
    async fn test_fresh_session_cache_and_display_order() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        // Two remote records, T1 < T2
        let ledger = Arc::new(MockLedger::with_remote(vec![
            raw_transfer(100),
            raw_transfer(200),
        ]));
        let provider = Arc::new(MockProvider::on_chain(CHAIN).with_accounts(vec![ACCOUNT]))
            as Arc<dyn WalletProvider>;

        let mut sync = LedgerSync::with_ledger(
            &config,
            Some(provider),
            Some(ledger as Arc<dyn TransactionLedger>),
        )
        .await
        .unwrap();
        sync.start().await.unwrap();

        // Cache keeps source order, display reverses it
        let cached = sync.state.transactions.read().await.clone();
        assert_eq!(cached[0].timestamp, 100);
        assert_eq!(cached[1].timestamp, 200);

        let snapshot = sync.snapshot().await;
        assert_eq!(snapshot.current_account.as_deref(), Some(ACCOUNT));
        assert_eq!(snapshot.transactions[0].timestamp, 200);
        assert_eq!(snapshot.transactions[1].timestamp, 100);

        sync.shutdown();
    }

    #[tokio::test]
    async fn test_cold_start_paints_from_cache() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        // A previous session left a cache behind
        let store = LedgerStore::open(dir.path()).unwrap();
        store
            .save_transactions(&[raw_transfer(7).into()])
            .await
            .unwrap();
        store.save_count(7).await.unwrap();

        // No wallet installed this time
        let sync = LedgerSync::with_ledger(&config, None, None).await.unwrap();

        let snapshot = sync.snapshot().await;
        assert_eq!(snapshot.transactions.len(), 1);
        assert_eq!(snapshot.transaction_count, 7);
        assert!(snapshot.current_account.is_none());
        assert!(!snapshot.is_submitting);
    }

    #[tokio::test]
    async fn test_submit_without_provider_reports_install() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let sync = LedgerSync::with_ledger(&config, None, None).await.unwrap();

        assert!(matches!(
            sync.submit_transfer(&TransferDraft::default()).await,
            Err(Error::ProviderAbsent)
        ));
    }

    #[tokio::test]
    async fn test_draft_staging() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let sync = LedgerSync::with_ledger(&config, None, None).await.unwrap();

        let draft = TransferDraft {
            receiver: "0xabc".to_string(),
            amount: "0.05".to_string(),
            keyword: "dog".to_string(),
            message: "hi".to_string(),
        };
        sync.set_draft(draft.clone()).await;
        assert_eq!(sync.draft().await, draft);
    }
}

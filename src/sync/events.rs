//! Event subscriber
//!
//! Bridges the contract's Transfer event stream to the fetcher. The payload
//! is logged and discarded; each event just triggers one full refetch, which
//! makes the pipeline immune to event ordering and drops at the cost of
//! bandwidth. Bursts may collapse into fewer fetches.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::Result;
use crate::eth::units;
use crate::ledger::TransactionLedger;

use super::fetcher::LedgerFetcher;

pub struct EventSubscriber;

impl EventSubscriber {
    /// Attach to the Transfer stream for the life of the session
    pub async fn attach(
        ledger: Arc<dyn TransactionLedger>,
        fetcher: Arc<LedgerFetcher>,
    ) -> Result<SubscriptionHandle> {
        let mut subscription = ledger.subscribe_transfers().await?;
        info!("transfer event subscriber attached");

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                debug!(
                    "transfer event: {} -> {} ({} ether), refetching",
                    event.sender,
                    event.receiver,
                    units::format_ether(event.amount_wei)
                );
                fetcher.refresh_transactions().await;
            }
            debug!("transfer event stream ended");
        });

        Ok(SubscriptionHandle { task })
    }
}

/// Cancellation handle for an attached subscriber
///
/// Detaching (or dropping) stops the forwarding task, which in turn drops
/// the underlying subscription and stops the contract listener.
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn detach(self) {
        self.task.abort();
        info!("transfer event subscriber detached");
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerStore;
    use crate::sync::testutil::{raw_transfer, MockLedger};
    use crate::sync::SharedState;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn wait_for_fetches(ledger: &MockLedger, expected: usize) {
        for _ in 0..100 {
            if ledger.fetch_calls.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {expected} fetches, saw {}",
            ledger.fetch_calls.load(Ordering::SeqCst)
        );
    }

    fn build(
        ledger: Arc<MockLedger>,
        dir: &std::path::Path,
    ) -> (Arc<LedgerFetcher>, Arc<SharedState>) {
        let state = Arc::new(SharedState::new());
        let store = LedgerStore::open(dir).unwrap();
        let fetcher = Arc::new(LedgerFetcher::new(
            Some(ledger as Arc<dyn TransactionLedger>),
            store,
            state.clone(),
        ));
        (fetcher, state)
    }

    #[tokio::test]
    async fn test_one_event_triggers_one_fetch() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(MockLedger::with_remote(vec![raw_transfer(1)]));
        let (fetcher, state) = build(ledger.clone(), dir.path());

        let handle = EventSubscriber::attach(ledger.clone(), fetcher).await.unwrap();

        ledger.emit(raw_transfer(2)).await;
        wait_for_fetches(&ledger, 1).await;

        // Exactly one fetch for one event
        assert_eq!(ledger.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.transactions.read().await.len(), 1);

        handle.detach();
    }

    #[tokio::test]
    async fn test_each_event_eventually_refetches() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(MockLedger::with_remote(vec![]));
        let (fetcher, _) = build(ledger.clone(), dir.path());

        let _handle = EventSubscriber::attach(ledger.clone(), fetcher).await.unwrap();

        ledger.emit(raw_transfer(1)).await;
        ledger.emit(raw_transfer(2)).await;
        ledger.emit(raw_transfer(3)).await;
        wait_for_fetches(&ledger, 3).await;
    }

    #[tokio::test]
    async fn test_detach_stops_forwarding() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(MockLedger::with_remote(vec![]));
        let (fetcher, _) = build(ledger.clone(), dir.path());

        let handle = EventSubscriber::attach(ledger.clone(), fetcher).await.unwrap();
        handle.detach();
        tokio::time::sleep(Duration::from_millis(20)).await;

        ledger.emit(raw_transfer(1)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(ledger.fetch_calls.load(Ordering::SeqCst), 0);
    }
}

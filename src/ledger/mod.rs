//! The on-chain transfer ledger boundary
//!
//! `TransactionLedger` is the authoritative, append-only transaction log.
//! `RpcLedger` implements it over a wallet provider; the cache module keeps
//! the local mirror of it.

pub mod cache;
pub mod contract;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;

pub use crate::eth::abi::RawTransfer;
pub use cache::{LedgerStore, TransferRecord};
pub use contract::RpcLedger;

/// The contract's query and entry-point surface
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Full transaction history, chronological as returned by the contract
    async fn all_transactions(&self) -> Result<Vec<RawTransfer>>;

    /// Total number of recorded transfers
    async fn transaction_count(&self) -> Result<u64>;

    /// Record a transfer in the ledger; the returned handle finalizes it
    async fn record_transfer(
        &self,
        from: &str,
        receiver: &str,
        amount_wei: u128,
        message: &str,
        keyword: &str,
    ) -> Result<PendingRecord>;

    /// Attach to the contract's Transfer event stream
    async fn subscribe_transfers(&self) -> Result<TransferSubscription>;
}

/// A submitted ledger record awaiting inclusion
pub struct PendingRecord {
    pub tx_hash: String,
    waiter: BoxFuture<'static, Result<()>>,
}

impl PendingRecord {
    pub fn new<F>(tx_hash: String, waiter: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            tx_hash,
            waiter: Box::pin(waiter),
        }
    }

    /// An already-finalized record (test doubles, dry runs)
    pub fn ready(tx_hash: String) -> Self {
        Self::new(tx_hash, async { Ok(()) })
    }

    /// Block until the record is included, or fail with the inclusion error
    pub async fn wait(self) -> Result<()> {
        self.waiter.await
    }
}

/// An attached Transfer event stream plus its cancellation handle
///
/// Dropping the subscription detaches the underlying listener.
pub struct TransferSubscription {
    events: mpsc::Receiver<RawTransfer>,
    stop: Option<oneshot::Sender<()>>,
}

impl TransferSubscription {
    pub fn new(events: mpsc::Receiver<RawTransfer>, stop: oneshot::Sender<()>) -> Self {
        Self {
            events,
            stop: Some(stop),
        }
    }

    /// Next event, or None once the stream has ended
    pub async fn recv(&mut self) -> Option<RawTransfer> {
        self.events.recv().await
    }

    /// Stop the underlying listener
    pub fn detach(mut self) {
        self.signal_stop();
    }

    fn signal_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for TransferSubscription {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

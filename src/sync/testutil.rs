//! Shared test doubles for the wallet and ledger boundaries

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::eth::WalletProvider;
use crate::ledger::{PendingRecord, RawTransfer, TransactionLedger, TransferSubscription};

/// A deterministic remote record; timestamp doubles as its identity in tests
pub fn raw_transfer(timestamp: u64) -> RawTransfer {
    RawTransfer {
        sender: "0x1111111111111111111111111111111111111111".to_string(),
        receiver: "0x2222222222222222222222222222222222222222".to_string(),
        amount_wei: 10_000_000_000_000_000,
        message: "gm".to_string(),
        timestamp,
        keyword: "dog".to_string(),
    }
}

/// Wallet double covering the methods the core calls
pub struct MockProvider {
    pub chain_id: String,
    pub accounts: Vec<String>,
    pub deny_authorization: bool,
    pub fail_send: bool,
    pub fail_chain_query: bool,
    pub calls: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn on_chain(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            accounts: Vec::new(),
            deny_authorization: false,
            fail_send: false,
            fail_chain_query: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_accounts(mut self, accounts: Vec<&str>) -> Self {
        self.accounts = accounts.into_iter().map(str::to_string).collect();
        self
    }

    /// Number of eth_sendTransaction calls observed
    pub fn send_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| *m == "eth_sendTransaction")
            .count()
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, method: &str, _params: Value) -> Result<Value> {
        self.calls.lock().unwrap().push(method.to_string());

        match method {
            "eth_chainId" => {
                if self.fail_chain_query {
                    Err(Error::Rpc("chain query failed".to_string()))
                } else {
                    Ok(json!(self.chain_id))
                }
            }
            "eth_accounts" => Ok(json!(self.accounts)),
            "eth_requestAccounts" => {
                if self.deny_authorization {
                    Err(Error::AuthorizationDenied)
                } else {
                    Ok(json!(self.accounts))
                }
            }
            "eth_sendTransaction" => {
                if self.fail_send {
                    Err(Error::Rpc("wallet rejected the transaction".to_string()))
                } else {
                    Ok(json!("0xmockedtransactionhash"))
                }
            }
            "eth_blockNumber" => Ok(json!("0x1")),
            other => Err(Error::Rpc(format!("unexpected rpc call {other}"))),
        }
    }
}

/// Ledger double with a scriptable remote state and an event channel
pub struct MockLedger {
    pub remote: Mutex<Vec<RawTransfer>>,
    pub count: AtomicU64,
    pub fetch_calls: AtomicUsize,
    pub record_calls: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_record: bool,
    event_tx: Mutex<Option<mpsc::Sender<RawTransfer>>>,
}

impl MockLedger {
    pub fn with_remote(remote: Vec<RawTransfer>) -> Self {
        Self {
            remote: Mutex::new(remote),
            count: AtomicU64::new(0),
            fetch_calls: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
            fail_fetch: AtomicBool::new(false),
            fail_record: false,
            event_tx: Mutex::new(None),
        }
    }

    /// Emit one simulated Transfer event; a no-op with no subscriber attached
    pub async fn emit(&self, event: RawTransfer) {
        let sender = self.event_tx.lock().unwrap().clone();
        if let Some(tx) = sender {
            let _ = tx.send(event).await;
        }
    }
}

#[async_trait]
impl TransactionLedger for MockLedger {
    async fn all_transactions(&self) -> Result<Vec<RawTransfer>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Rpc("remote fetch failed".to_string()));
        }
        Ok(self.remote.lock().unwrap().clone())
    }

    async fn transaction_count(&self) -> Result<u64> {
        Ok(self.count.load(Ordering::SeqCst))
    }

    async fn record_transfer(
        &self,
        _from: &str,
        _receiver: &str,
        _amount_wei: u128,
        _message: &str,
        _keyword: &str,
    ) -> Result<PendingRecord> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_record {
            return Err(Error::Rpc("contract record call failed".to_string()));
        }
        Ok(PendingRecord::ready("0xmockedrecordhash".to_string()))
    }

    async fn subscribe_transfers(&self) -> Result<TransferSubscription> {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (stop_tx, _stop_rx) = oneshot::channel();
        *self.event_tx.lock().unwrap() = Some(event_tx);
        Ok(TransferSubscription::new(event_rx, stop_tx))
    }
}

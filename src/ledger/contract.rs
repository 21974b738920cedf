//! RPC-backed ledger implementation
//!
//! Implements the ledger boundary over a wallet provider: reads go through
//! `eth_call`, writes through `eth_sendTransaction` with hand-encoded
//! calldata, finalization by polling for the receipt, and the Transfer
//! event stream by polling `eth_getLogs` from the height at attach time.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, warn};

use crate::config::ContractConfig;
use crate::error::{Error, Result};
use crate::eth::{abi, provider, WalletProvider};

use super::{PendingRecord, RawTransfer, TransactionLedger, TransferSubscription};

/// Buffered events between the poller and the subscriber
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Ledger handle bound to one deployed contract
pub struct RpcLedger {
    provider: Arc<dyn WalletProvider>,
    address: String,
    receipt_poll_interval: Duration,
    event_poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(provider: Arc<dyn WalletProvider>, config: &ContractConfig) -> Self {
        Self {
            provider,
            address: config.address.clone(),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            event_poll_interval: Duration::from_millis(config.event_poll_interval_ms),
        }
    }

    async fn call(&self, calldata: Vec<u8>) -> Result<Vec<u8>> {
        let data = abi::encode_hex_payload(&calldata);
        let returned = provider::call(&*self.provider, &self.address, &data).await?;
        abi::decode_hex_payload(&returned)
    }
}

#[async_trait]
impl TransactionLedger for RpcLedger {
    async fn all_transactions(&self) -> Result<Vec<RawTransfer>> {
        let data = self.call(abi::encode_get_all_transactions()).await?;
        abi::decode_transaction_list(&data)
    }

    async fn transaction_count(&self) -> Result<u64> {
        let data = self.call(abi::encode_get_transaction_count()).await?;
        abi::decode_transaction_count(&data)
    }

    async fn record_transfer(
        &self,
        from: &str,
        receiver: &str,
        amount_wei: u128,
        message: &str,
        keyword: &str,
    ) -> Result<PendingRecord> {
        let calldata = abi::encode_add_to_blockchain(receiver, amount_wei, message, keyword)?;

        // The record call carries no value; gas estimation is left to the wallet
        let request = serde_json::json!([{
            "from": from,
            "to": self.address,
            "data": abi::encode_hex_payload(&calldata),
        }]);
        let tx_hash = self
            .provider
            .request("eth_sendTransaction", request)
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Rpc("eth_sendTransaction returned no hash".to_string()))?;

        debug!("ledger record submitted: {}", tx_hash);

        let provider = self.provider.clone();
        let poll_interval = self.receipt_poll_interval;
        let hash = tx_hash.clone();

        // No timeout by design: the caller blocks until inclusion or rejection
        Ok(PendingRecord::new(tx_hash, async move {
            let mut ticker = interval(poll_interval);
            loop {
                ticker.tick().await;
                if let Some(receipt) = provider::transaction_receipt(&*provider, &hash).await? {
                    if receipt.succeeded() {
                        debug!("ledger record included: {}", hash);
                        return Ok(());
                    }
                    return Err(Error::Reverted(hash));
                }
            }
        }))
    }

    async fn subscribe_transfers(&self) -> Result<TransferSubscription> {
        // Only events after attach time matter; history comes from full fetches
        let mut next_block = provider::block_number(&*self.provider).await? + 1;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let provider = self.provider.clone();
        let address = self.address.clone();
        let poll_interval = self.event_poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let head = match provider::block_number(&*provider).await {
                            Ok(head) => head,
                            Err(e) => {
                                warn!("block height poll failed: {}", e);
                                continue;
                            }
                        };
                        if head < next_block {
                            continue;
                        }

                        let logs = match provider::get_logs(
                            &*provider,
                            &address,
                            abi::TRANSFER_EVENT_TOPIC,
                            next_block,
                            head,
                        )
                        .await
                        {
                            Ok(logs) => logs,
                            Err(e) => {
                                warn!("transfer log poll failed: {}", e);
                                continue;
                            }
                        };

                        // The polled range is closed at the head height, so the
                        // cursor advances past it whether or not logs arrived
                        next_block = head + 1;

                        for log in logs {
                            let event = match abi::decode_hex_payload(&log.data)
                                .and_then(|data| abi::decode_transfer_tuple(&data))
                            {
                                Ok(event) => event,
                                Err(e) => {
                                    warn!("undecodable transfer event, skipping: {}", e);
                                    continue;
                                }
                            };

                            if event_tx.send(event).await.is_err() {
                                debug!("transfer subscription receiver dropped");
                                return;
                            }
                        }
                    }
                    _ = &mut stop_rx => {
                        debug!("transfer subscription detached");
                        return;
                    }
                }
            }
        });

        Ok(TransferSubscription::new(event_rx, stop_tx))
    }
}

//! Wallet provider boundary
//!
//! Everything the synchronizer needs from a wallet is the single JSON-RPC
//! style `request(method, params)` entry point, so that is the whole trait.
//! Typed helpers wrap the raw calls the rest of the crate makes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::eth::units;

/// EIP-1193 error code for a user rejecting a request
const USER_REJECTED_REQUEST: i64 = 4001;

/// Wallet provider boundary: account access, chain identity, signing
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Submit one RPC request and return its raw result
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// A plain value transfer as submitted through `eth_sendTransaction`
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    /// Gas allowance, hex quantity
    pub gas: String,
    /// Value in wei, hex quantity
    pub value: String,
}

impl TransactionRequest {
    pub fn value_transfer(from: &str, to: &str, gas: u64, value_wei: u128) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            gas: units::to_hex_quantity(gas as u128),
            value: units::to_hex_quantity(value_wei),
        }
    }
}

/// One entry returned by `eth_getLogs`
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    pub data: String,
}

/// The subset of a transaction receipt the synchronizer inspects
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
}

impl TransactionReceipt {
    /// True when the included transaction did not revert
    pub fn succeeded(&self) -> bool {
        // Pre-Byzantium receipts carry no status; treat absence as success
        self.status.as_deref() != Some("0x0")
    }
}

/// Active chain identifier (`eth_chainId`), as a hex quantity string
pub async fn chain_id(provider: &dyn WalletProvider) -> Result<String> {
    let value = provider.request("eth_chainId", json!([])).await?;
    as_string(value, "eth_chainId")
}

/// Already-authorized accounts (`eth_accounts`), no user prompt
pub async fn accounts(provider: &dyn WalletProvider) -> Result<Vec<String>> {
    let value = provider.request("eth_accounts", json!([])).await?;
    as_string_list(value, "eth_accounts")
}

/// Request account authorization (`eth_requestAccounts`), may prompt the user
pub async fn request_accounts(provider: &dyn WalletProvider) -> Result<Vec<String>> {
    let value = provider.request("eth_requestAccounts", json!([])).await?;
    as_string_list(value, "eth_requestAccounts")
}

/// Submit a transaction through the wallet, returning its hash
pub async fn send_transaction(
    provider: &dyn WalletProvider,
    request: &TransactionRequest,
) -> Result<String> {
    let value = provider
        .request("eth_sendTransaction", json!([request]))
        .await?;
    as_string(value, "eth_sendTransaction")
}

/// Read-only contract call (`eth_call` against latest)
pub async fn call(provider: &dyn WalletProvider, to: &str, data: &str) -> Result<String> {
    let value = provider
        .request("eth_call", json!([{"to": to, "data": data}, "latest"]))
        .await?;
    as_string(value, "eth_call")
}

/// Current block height
pub async fn block_number(provider: &dyn WalletProvider) -> Result<u64> {
    let value = provider.request("eth_blockNumber", json!([])).await?;
    let quantity = as_string(value, "eth_blockNumber")?;
    let height = units::from_hex_quantity(&quantity)?;
    u64::try_from(height).map_err(|_| Error::Rpc(format!("block height {quantity} exceeds u64")))
}

/// Logs for one contract and topic in an inclusive block range
pub async fn get_logs(
    provider: &dyn WalletProvider,
    address: &str,
    topic0: &str,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<LogEntry>> {
    let filter = json!([{
        "address": address,
        "topics": [topic0],
        "fromBlock": units::to_hex_quantity(from_block as u128),
        "toBlock": units::to_hex_quantity(to_block as u128),
    }]);
    let value = provider.request("eth_getLogs", filter).await?;
    serde_json::from_value(value).map_err(|e| Error::Rpc(format!("bad eth_getLogs result: {e}")))
}

/// Receipt for a submitted transaction, None while still pending
pub async fn transaction_receipt(
    provider: &dyn WalletProvider,
    tx_hash: &str,
) -> Result<Option<TransactionReceipt>> {
    let value = provider
        .request("eth_getTransactionReceipt", json!([tx_hash]))
        .await?;
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| Error::Rpc(format!("bad receipt: {e}")))
}

fn as_string(value: Value, method: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Rpc(format!("{method} returned a non-string result")))
}

fn as_string_list(value: Value, method: &str) -> Result<Vec<String>> {
    serde_json::from_value(value)
        .map_err(|e| Error::Rpc(format!("{method} returned a malformed list: {e}")))
}

/// JSON-RPC 2.0 provider over HTTP
///
/// Speaks to a node (or wallet RPC bridge) at a fixed endpoint. Browser-only
/// methods like `eth_requestAccounts` succeed against nodes with unlocked
/// accounts and fail cleanly elsewhere.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl HttpProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("rpc -> {} (id {})", method, id);

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            if error.code == USER_REJECTED_REQUEST {
                return Err(Error::AuthorizationDenied);
            }
            return Err(Error::Rpc(format!(
                "{method} failed: {} (code {})",
                error.message, error.code
            )));
        }

        response
            .result
            .ok_or_else(|| Error::Rpc(format!("{method} returned neither result nor error")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_transfer_request_fields_are_hex() {
        let request = TransactionRequest::value_transfer(
            "0x1111111111111111111111111111111111111111",
            "0x2222222222222222222222222222222222222222",
            21_000,
            10_000_000_000_000_000,
        );

        assert_eq!(request.gas, "0x5208");
        assert_eq!(request.value, "0x2386f26fc10000");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["from"], "0x1111111111111111111111111111111111111111");
        assert_eq!(json["gas"], "0x5208");
    }

    #[test]
    fn test_receipt_status_interpretation() {
        let ok = TransactionReceipt {
            status: Some("0x1".to_string()),
            block_number: None,
        };
        let reverted = TransactionReceipt {
            status: Some("0x0".to_string()),
            block_number: None,
        };
        let legacy = TransactionReceipt {
            status: None,
            block_number: None,
        };

        assert!(ok.succeeded());
        assert!(!reverted.succeeded());
        assert!(legacy.succeeded());
    }
}

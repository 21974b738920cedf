//! Ethereum wire-level plumbing
//!
//! Unit conversion, the minimal ABI codec for the ledger contract, and the
//! wallet provider boundary.

pub mod abi;
pub mod provider;
pub mod units;

pub use provider::{HttpProvider, TransactionRequest, WalletProvider};

//! walletsync
//!
//! Client-side synchronizer between an Ethereum wallet provider, a single
//! smart contract's transfer ledger and a durable local cache of it.

pub mod cli;
pub mod config;
pub mod error;
pub mod eth;
pub mod ledger;
pub mod sync;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};

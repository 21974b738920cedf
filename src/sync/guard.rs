//! Network identity precondition
//!
//! Every state-changing operation checks that the wallet is attached to the
//! configured chain before proceeding. Failure is non-fatal: the caller
//! simply does not proceed.

use std::sync::Arc;
use tracing::warn;

use crate::eth::{provider, WalletProvider};

pub struct NetworkGuard {
    provider: Arc<dyn WalletProvider>,
    expected_chain_id: String,
}

impl NetworkGuard {
    pub fn new(provider: Arc<dyn WalletProvider>, expected_chain_id: &str) -> Self {
        Self {
            provider,
            expected_chain_id: expected_chain_id.to_string(),
        }
    }

    pub fn expected_chain_id(&self) -> &str {
        &self.expected_chain_id
    }

    /// True iff the wallet's active chain is the configured one
    ///
    /// A failed chain query counts as a mismatch. The warning here is the
    /// user-facing surface; no retry.
    pub async fn ensure_expected_network(&self) -> bool {
        match provider::chain_id(&*self.provider).await {
            Ok(actual) if actual.eq_ignore_ascii_case(&self.expected_chain_id) => true,
            Ok(actual) => {
                warn!(
                    "wallet is on chain {}, please switch to {}",
                    actual, self.expected_chain_id
                );
                false
            }
            Err(e) => {
                warn!("network check failed: {}", e);
                false
            }
        }
    }
}

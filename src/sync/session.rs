//! Account session
//!
//! Tracks which external account is authorized and how it became so. This
//! module is the sole writer of `current_account`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::eth::{provider, WalletProvider};

use super::fetcher::LedgerFetcher;
use super::guard::NetworkGuard;
use super::SharedState;

/// Submission phase; `is_submitting` is true for every non-idle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPhase {
    #[default]
    Idle,
    Guarding,
    Transferring,
    Recording,
    Refreshing,
}

/// Pending transfer inputs, raw strings until validated at submit time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferDraft {
    pub receiver: String,
    pub amount: String,
    pub keyword: String,
    pub message: String,
}

/// Ephemeral per-session state, never persisted
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub current_account: Option<String>,
    pub phase: SubmitPhase,
    pub draft: TransferDraft,
}

impl SessionState {
    pub fn is_submitting(&self) -> bool {
        self.phase != SubmitPhase::Idle
    }
}

pub struct AccountSession {
    provider: Option<Arc<dyn WalletProvider>>,
    guard: Option<NetworkGuard>,
    fetcher: Arc<LedgerFetcher>,
    state: Arc<SharedState>,
}

impl AccountSession {
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        expected_chain_id: &str,
        fetcher: Arc<LedgerFetcher>,
        state: Arc<SharedState>,
    ) -> Self {
        let guard = provider
            .clone()
            .map(|p| NetworkGuard::new(p, expected_chain_id));
        Self {
            provider,
            guard,
            fetcher,
            state,
        }
    }

    /// Restore an already-authorized session at startup, without prompting
    ///
    /// A missing provider, a wrong network or an empty account list all
    /// leave the session unauthenticated without error.
    pub async fn restore(&self) -> Result<()> {
        let (provider, guard) = match (&self.provider, &self.guard) {
            (Some(p), Some(g)) => (p, g),
            _ => {
                debug!("no wallet provider, skipping session restore");
                return Ok(());
            }
        };

        if !guard.ensure_expected_network().await {
            return Ok(());
        }

        let accounts = match provider::accounts(&**provider).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("account listing failed: {}", e);
                return Ok(());
            }
        };

        let Some(first) = accounts.first() else {
            debug!("no authorized accounts, session stays disconnected");
            return Ok(());
        };

        self.adopt(first).await;
        self.fetcher.refresh_transactions().await;
        Ok(())
    }

    /// Actively request authorization, possibly prompting the user
    ///
    /// Returns the adopted account, or None when the user declined.
    pub async fn connect(&self) -> Result<Option<String>> {
        let (provider, guard) = match (&self.provider, &self.guard) {
            (Some(p), Some(g)) => (p, g),
            _ => return Err(Error::ProviderAbsent),
        };

        if !guard.ensure_expected_network().await {
            return Err(Error::WrongNetwork {
                expected: guard.expected_chain_id().to_string(),
            });
        }

        let accounts = match provider::request_accounts(&**provider).await {
            Ok(accounts) => accounts,
            Err(Error::AuthorizationDenied) => {
                warn!("wallet authorization denied, session stays disconnected");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(first) = accounts.first() else {
            return Ok(None);
        };

        self.adopt(first).await;
        self.fetcher.refresh_transactions().await;
        Ok(Some(first.clone()))
    }

    async fn adopt(&self, account: &str) {
        info!("session account: {}", account);
        self.state.session.write().await.current_account = Some(account.to_string());
    }
}

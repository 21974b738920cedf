//! Error types for the synchronizer

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the synchronizer
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Wallet boundary errors
    #[error("No wallet provider available - please install a wallet")]
    ProviderAbsent,

    #[error("Wrong network - please switch the wallet to chain {expected}")]
    WrongNetwork { expected: String },

    #[error("Wallet authorization denied by user")]
    AuthorizationDenied,

    #[error("No account connected")]
    NotConnected,

    // Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    // Contract wire format errors
    #[error("ABI encoding error: {0}")]
    AbiEncode(String),

    #[error("ABI decoding error: {0}")]
    AbiDecode(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    // Cache persistence errors
    #[error("Cache persistence failed: {0}")]
    Persistence(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Rpc(_) | Error::RpcConnection(_))
    }

    /// Check if this error requires user action (install, switch network, re-auth)
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            Error::ProviderAbsent
                | Error::WrongNetwork { .. }
                | Error::AuthorizationDenied
                | Error::Validation(_)
        )
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::RpcConnection(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

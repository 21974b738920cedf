//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    pub contract: ContractConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Chain id the wallet must be attached to (hex quantity, Sepolia by default)
    #[serde(default = "default_chain_id")]
    pub expected_chain_id: String,
    /// Gas allowance for the plain value transfer
    #[serde(default = "default_transfer_gas")]
    pub transfer_gas: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            expected_chain_id: default_chain_id(),
            transfer_gas: default_transfer_gas(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    /// Address of the transfer ledger contract
    pub address: String,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_event_poll_ms")]
    pub event_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the durable cache slots
    #[serde(default = "default_storage_dir")]
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

fn default_rpc_endpoint() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_chain_id() -> String {
    // Sepolia
    "0xaa36a7".to_string()
}

fn default_transfer_gas() -> u64 {
    21_000
}

fn default_receipt_poll_ms() -> u64 {
    2_000
}

fn default_event_poll_ms() -> u64 {
    5_000
}

fn default_storage_dir() -> String {
    "data".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix WALLETSYNC__)
            .add_source(
                config::Environment::with_prefix("WALLETSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !is_hex_address(&self.contract.address) {
            anyhow::bail!(
                "contract.address must be a 0x-prefixed 20-byte hex address, got {:?}",
                self.contract.address
            );
        }

        let chain = &self.chain.expected_chain_id;
        if !chain.starts_with("0x")
            || chain.len() <= 2
            || !chain[2..].chars().all(|c| c.is_ascii_hexdigit())
        {
            anyhow::bail!(
                "chain.expected_chain_id must be a 0x hex quantity, got {:?}",
                chain
            );
        }

        if self.chain.transfer_gas == 0 {
            anyhow::bail!("chain.transfer_gas must be positive");
        }

        if self.contract.receipt_poll_interval_ms == 0 {
            anyhow::bail!("contract.receipt_poll_interval_ms must be positive");
        }

        if self.contract.event_poll_interval_ms == 0 {
            anyhow::bail!("contract.event_poll_interval_ms must be positive");
        }

        Ok(())
    }
}

/// Check for a 0x-prefixed 20-byte hex address
pub fn is_hex_address(s: &str) -> bool {
    s.len() == 42 && s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            rpc: RpcConfig::default(),
            chain: ChainConfig::default(),
            contract: ContractConfig {
                address: "0x2ab407bd96b9b4c9d31595028e1a402d2c7ec1f1".to_string(),
                receipt_poll_interval_ms: default_receipt_poll_ms(),
                event_poll_interval_ms: default_event_poll_ms(),
            },
            storage: StorageConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_bad_contract_address_rejected() {
        let mut config = base_config();
        config.contract.address = "0x1234".to_string();
        assert!(config.validate().is_err());

        config.contract.address = "2ab407bd96b9b4c9d31595028e1a402d2c7ec1f1ab".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_chain_id_rejected() {
        let mut config = base_config();
        config.chain.expected_chain_id = "11155111".to_string();
        assert!(config.validate().is_err());

        config.chain.expected_chain_id = "0x".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_hex_address() {
        assert!(is_hex_address("0x2ab407bd96b9b4c9d31595028e1a402d2c7ec1f1"));
        assert!(!is_hex_address("0x2ab407bd96b9b4c9d31595028e1a402d2c7ec1f"));
        assert!(!is_hex_address("0x2ab407bd96b9b4c9d31595028e1a402d2c7eczz1"));
    }
}

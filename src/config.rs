use std::{path::Path, str::FromStr};

use alloy::{
    network::EthereumWallet,
    primitives::{utils::parse_ether, Address, U256},
    signers::local::PrivateKeySigner,
};
use serde::Deserialize;

use crate::constants::{
    CONFIG_FILE_PATH, DEFAULT_RECEIPT_POLL_INTERVAL_MS, DEFAULT_RECEIPT_TIMEOUT_SECS,
    DEFAULT_TRANSFER_AMOUNT, SENDER_ADDRESS_ENV, SENDER_PRIVATE_KEY_ENV,
};

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub rpc_url: String,
    pub addresses_file_path: String,
    /// Amount sent to every funded address, in ether.
    #[serde(default = "default_transfer_amount")]
    pub transfer_amount: String,
    /// Expected chain id. Startup fails if the node reports another one.
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

fn default_transfer_amount() -> String {
    DEFAULT_TRANSFER_AMOUNT.to_string()
}

fn default_receipt_timeout_secs() -> u64 {
    DEFAULT_RECEIPT_TIMEOUT_SECS
}

fn default_receipt_poll_interval_ms() -> u64 {
    DEFAULT_RECEIPT_POLL_INTERVAL_MS
}

impl Config {
    async fn read_from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let cfg_str = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&cfg_str)?)
    }

    pub async fn read_default() -> eyre::Result<Self> {
        let config = Self::read_from_file(CONFIG_FILE_PATH)
            .await
            .map_err(|e| eyre::eyre!("Failed to read config from {CONFIG_FILE_PATH}: {e}"))?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.receipt_poll_interval_ms == 0 {
            eyre::bail!("RECEIPT_POLL_INTERVAL_MS must be greater than zero");
        }
        self.transfer_amount_wei()?;

        Ok(())
    }

    pub fn transfer_amount_wei(&self) -> eyre::Result<U256> {
        parse_ether(&self.transfer_amount)
            .map_err(|e| eyre::eyre!("Invalid TRANSFER_AMOUNT '{}': {e}", self.transfer_amount))
    }
}

/// Sender key material. Never logged.
pub struct Credentials {
    pub wallet: EthereumWallet,
    pub sender: Address,
}

impl Credentials {
    pub fn from_env() -> eyre::Result<Self> {
        let private_key = std::env::var(SENDER_PRIVATE_KEY_ENV)
            .map_err(|_| eyre::eyre!("{SENDER_PRIVATE_KEY_ENV} must be set"))?;
        let expected_sender = std::env::var(SENDER_ADDRESS_ENV).ok();

        Self::from_parts(&private_key, expected_sender.as_deref())
    }

    pub fn from_parts(private_key: &str, expected_sender: Option<&str>) -> eyre::Result<Self> {
        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|_| eyre::eyre!("{SENDER_PRIVATE_KEY_ENV} is not a valid private key"))?;
        let sender = signer.address();

        if let Some(expected) = expected_sender {
            let expected = Address::from_str(expected.trim())?;
            if expected != sender {
                eyre::bail!(
                    "{SENDER_ADDRESS_ENV} {expected} does not match the address of the private key {sender}"
                );
            }
        }

        Ok(Self {
            wallet: EthereumWallet::new(signer),
            sender,
        })
    }
}

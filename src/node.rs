use std::{marker::PhantomData, time::Duration};

use alloy::{
    consensus::TxEnvelope,
    network::{Ethereum, TransactionBuilder},
    primitives::{Address, TxHash, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::{client::ClientBuilder, types::TransactionRequest},
    transports::{http::Http, layers::RetryBackoffLayer, Transport},
};
use thiserror::Error;
use tokio::time::{interval, timeout};

use crate::{
    config::Config,
    constants::{RPC_COMPUTE_UNITS_PER_SECOND, RPC_INITIAL_BACKOFF_MS, RPC_MAX_RETRIES},
};

/// The receipt of a submitted transaction did not show up within the wait bound.
#[derive(Error, Debug)]
#[error("Transaction {tx_hash} is not in the chain after {} seconds", .waited.as_secs())]
pub struct ReceiptTimeout {
    pub tx_hash: TxHash,
    pub waited: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub gas_used: u128,
    pub success: bool,
}

/// Everything the transfer loop needs from the chain.
pub trait NodeClient {
    async fn chain_id(&self) -> eyre::Result<u64>;

    async fn gas_price(&self) -> eyre::Result<u128>;

    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> eyre::Result<u64>;

    async fn transaction_count(&self, address: Address) -> eyre::Result<u64>;

    async fn balance(&self, address: Address) -> eyre::Result<U256>;

    async fn send_transaction(&self, envelope: TxEnvelope) -> eyre::Result<TxHash>;

    /// Fails with [`ReceiptTimeout`] once the wait bound elapses.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> eyre::Result<ReceiptSummary>;
}

pub struct AlloyNode<P, T> {
    provider: P,
    receipt_timeout: Duration,
    poll_interval: Duration,
    _transport: PhantomData<T>,
}

impl<P, T> AlloyNode<P, T>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    pub fn new(provider: P, receipt_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            provider,
            receipt_timeout,
            poll_interval,
            _transport: PhantomData,
        }
    }
}

/// HTTP provider with rate-limit retries at the transport level.
pub fn connect(config: &Config) -> eyre::Result<impl NodeClient> {
    config.validate()?;

    let rpc_url: reqwest::Url = config
        .rpc_url
        .parse()
        .map_err(|e| eyre::eyre!("Invalid RPC_URL '{}': {e}", config.rpc_url))?;

    let retry_layer = RetryBackoffLayer::new(
        RPC_MAX_RETRIES,
        RPC_INITIAL_BACKOFF_MS,
        RPC_COMPUTE_UNITS_PER_SECOND,
    );
    let client = ClientBuilder::default()
        .layer(retry_layer)
        .transport(Http::new(rpc_url), false);
    let provider = ProviderBuilder::new().on_provider(RootProvider::new(client));

    Ok(AlloyNode::new(
        provider,
        Duration::from_secs(config.receipt_timeout_secs),
        Duration::from_millis(config.receipt_poll_interval_ms),
    ))
}

impl<P, T> NodeClient for AlloyNode<P, T>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    async fn chain_id(&self) -> eyre::Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn gas_price(&self) -> eyre::Result<u128> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> eyre::Result<u64> {
        let tx_request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value);

        let gas_limit = self.provider.estimate_gas(&tx_request).await?;
        Ok(u64::try_from(gas_limit)?)
    }

    async fn transaction_count(&self, address: Address) -> eyre::Result<u64> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn balance(&self, address: Address) -> eyre::Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn send_transaction(&self, envelope: TxEnvelope) -> eyre::Result<TxHash> {
        let pending_tx = self.provider.send_tx_envelope(envelope).await?;
        Ok(*pending_tx.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> eyre::Result<ReceiptSummary> {
        let poll_receipt = async {
            let mut ticker = interval(self.poll_interval);

            loop {
                ticker.tick().await;

                match self.provider.get_transaction_receipt(tx_hash).await? {
                    Some(receipt) => {
                        return Ok::<_, eyre::Report>(ReceiptSummary {
                            gas_used: u128::from(receipt.gas_used),
                            success: receipt.status(),
                        })
                    }
                    None => tracing::debug!("Transaction {tx_hash} pending"),
                }
            }
        };

        timeout(self.receipt_timeout, poll_receipt)
            .await
            .map_err(|_| ReceiptTimeout {
                tx_hash,
                waited: self.receipt_timeout,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rpc_url: &str) -> Config {
        toml::from_str(&format!(
            "RPC_URL = \"{rpc_url}\"\nADDRESSES_FILE_PATH = \"data/addresses.csv\"\n"
        ))
        .unwrap()
    }

    #[test]
    fn rejects_invalid_rpc_url() {
        assert!(connect(&config("not a url")).is_err());
    }

    #[tokio::test]
    async fn connects_without_network_io() {
        assert!(connect(&config("http://localhost:8545")).is_ok());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let mut config = config("http://localhost:8545");
        config.receipt_poll_interval_ms = 0;

        assert!(connect(&config).is_err());
    }

    #[test]
    fn receipt_timeout_is_recognisable() {
        let report: eyre::Report = ReceiptTimeout {
            tx_hash: TxHash::ZERO,
            waited: Duration::from_secs(120),
        }
        .into();

        assert!(report.is::<ReceiptTimeout>());
        assert!(report.to_string().contains("after 120 seconds"));
    }
}

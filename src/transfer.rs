use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{utils::format_ether, Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use thiserror::Error;

use crate::{
    config::Credentials,
    node::{NodeClient, ReceiptTimeout},
};

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("{0}")]
    Timeout(eyre::Report),
    #[error("Gas estimation failed: {0}")]
    Estimation(eyre::Report),
    #[error("Transaction submission failed: {0}")]
    Submission(eyre::Report),
    #[error("{0}")]
    Other(eyre::Report),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fees {
    pub gas_fee: U256,
    /// Amount sent plus gas fee.
    pub transfer_fee: U256,
    /// Always zero, kept for display.
    pub base_fee: U256,
}

pub fn calculate_fees(gas_used: u128, gas_price: u128, transfer_amount: U256) -> Fees {
    let gas_fee = U256::from(gas_used) * U256::from(gas_price);

    Fees {
        gas_fee,
        transfer_fee: transfer_amount + gas_fee,
        base_fee: U256::ZERO,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub recipient: Address,
    pub tx_hash: TxHash,
    pub gas_used: u128,
    pub fees: Fees,
    /// False when the transaction was mined but reverted.
    pub success: bool,
}

/// A single transfer, built fresh for every attempt.
#[derive(Debug, Clone, Copy)]
struct TransferAttempt {
    recipient: Address,
    value: U256,
    gas_limit: u64,
    gas_price: u128,
    nonce: u64,
    chain_id: u64,
}

impl TransferAttempt {
    fn into_request(self, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(self.recipient)
            .with_value(self.value)
            .with_gas_limit(self.gas_limit.into())
            .with_gas_price(self.gas_price)
            .with_nonce(self.nonce)
            .with_chain_id(self.chain_id)
    }
}

pub trait TransferExecutor {
    /// Sends the fixed amount to `recipient` and logs the outcome. Errors are returned, never raised.
    async fn attempt_transfer(&self, recipient: Address) -> Result<TransferReport, TransferError>;
}

pub struct Transferrer<N> {
    node: N,
    wallet: EthereumWallet,
    sender: Address,
    transfer_amount: U256,
    chain_id: u64,
}

impl<N: NodeClient> Transferrer<N> {
    pub fn new(node: N, credentials: Credentials, transfer_amount: U256, chain_id: u64) -> Self {
        Self {
            node,
            wallet: credentials.wallet,
            sender: credentials.sender,
            transfer_amount,
            chain_id,
        }
    }

    async fn transfer(&self, recipient: Address) -> Result<TransferReport, TransferError> {
        let gas_price = self.node.gas_price().await.map_err(TransferError::Estimation)?;
        let gas_limit = self
            .node
            .estimate_transfer_gas(self.sender, recipient, self.transfer_amount)
            .await
            .map_err(TransferError::Estimation)?;

        let sender = self.sender.to_checksum(None);
        let nonce = self
            .node
            .transaction_count(self.sender)
            .await
            .map_err(TransferError::Other)?;
        let balance = self.node.balance(self.sender).await.map_err(TransferError::Other)?;
        tracing::info!(
            "Current balance of {sender}: {} ETH, nonce: {nonce}",
            format_ether(balance)
        );

        let tx_request = TransferAttempt {
            recipient,
            value: self.transfer_amount,
            gas_limit,
            gas_price,
            nonce,
            chain_id: self.chain_id,
        }
        .into_request(self.sender);

        let signed_transaction = tx_request
            .build(&self.wallet)
            .await
            .map_err(|e| TransferError::Other(eyre::Report::new(e)))?;
        let tx_hash = self
            .node
            .send_transaction(signed_transaction)
            .await
            .map_err(TransferError::Submission)?;

        let receipt = self.node.wait_for_receipt(tx_hash).await.map_err(|e| {
            if e.is::<ReceiptTimeout>() {
                TransferError::Timeout(e)
            } else {
                TransferError::Submission(e)
            }
        })?;

        Ok(TransferReport {
            recipient,
            tx_hash,
            gas_used: receipt.gas_used,
            fees: calculate_fees(receipt.gas_used, gas_price, self.transfer_amount),
            success: receipt.success,
        })
    }
}

impl<N: NodeClient> TransferExecutor for Transferrer<N> {
    async fn attempt_transfer(&self, recipient: Address) -> Result<TransferReport, TransferError> {
        let result = self.transfer(recipient).await;

        match &result {
            Ok(report) if report.success => {
                tracing::info!(
                    "Transferred {} ETH to {}. Txn Hash: {}, Transfer fee: {} ETH",
                    format_ether(self.transfer_amount),
                    report.recipient,
                    report.tx_hash,
                    format_ether(report.fees.transfer_fee)
                );
                tracing::debug!(
                    "Gas used: {}, gas fee: {} wei, base fee: {} wei",
                    report.gas_used,
                    report.fees.gas_fee,
                    report.fees.base_fee
                );
            }
            Ok(report) => tracing::error!(
                "Transfer to {recipient} reverted. Txn Hash: {}, Transfer fee: {} ETH",
                report.tx_hash,
                format_ether(report.fees.transfer_fee)
            ),
            Err(TransferError::Timeout(e)) => {
                tracing::error!("RPC call timed out for address {recipient}: {e}")
            }
            Err(e) => tracing::error!("Error transferring ETH to {recipient}: {e}"),
        }

        result
    }
}

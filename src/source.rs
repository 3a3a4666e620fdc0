use std::{io::Read, path::Path, str::FromStr};

use alloy::primitives::Address;
use thiserror::Error;

use crate::constants::BALANCE_DELIMITER;

#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("Row '{0}' has no balance column")]
    MissingBalance(String),
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
    #[error("Invalid balance '{balance}' for address {address}")]
    InvalidBalance { address: Address, balance: String },
}

/// One parsed row of the address file.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRecord {
    pub address: Address,
    /// Balance recorded in the file. Only used to decide eligibility.
    pub balance: f64,
}

impl AddressRecord {
    pub fn is_funded(&self) -> bool {
        self.balance > 0.0
    }
}

/// Parses `<address>;<balance>`. Extra `;` fields are ignored.
pub fn parse_record(row: &str) -> Result<AddressRecord, RecordError> {
    let mut fields = row.split(BALANCE_DELIMITER);
    let raw_address = fields.next().unwrap_or_default().trim();
    let raw_balance = fields
        .next()
        .ok_or_else(|| RecordError::MissingBalance(row.to_string()))?
        .trim();

    let address = Address::from_str(raw_address)
        .map_err(|_| RecordError::InvalidAddress(raw_address.to_string()))?;
    let balance = raw_balance
        .parse::<f64>()
        .ok()
        .filter(|balance| !balance.is_nan())
        .ok_or_else(|| RecordError::InvalidBalance {
            address,
            balance: raw_balance.to_string(),
        })?;

    Ok(AddressRecord { address, balance })
}

/// Rows of the address file, replayed from the first data row once the last one is consumed.
#[derive(Debug, Clone)]
pub struct AddressCycle {
    rows: Vec<String>,
    position: usize,
}

impl AddressCycle {
    pub async fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| eyre::eyre!("Error reading address file {}: {e}", path.display()))?;

        Self::from_reader(contents.as_slice())
    }

    /// Reads every data row up front. The first row is a header and is discarded.
    pub fn from_reader(reader: impl Read) -> eyre::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut rows = vec![];
        for record in csv_reader.records() {
            if let Some(first_field) = record?.get(0) {
                rows.push(first_field.to_string());
            }
        }

        Ok(Self { rows, position: 0 })
    }

    /// Next row, wrapping to the first one after the last. `None` only for a file without data rows.
    pub fn next_row(&mut self) -> Option<&str> {
        if self.rows.is_empty() {
            return None;
        }

        let index = self.position;
        self.position = (self.position + 1) % self.rows.len();

        Some(&self.rows[index])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

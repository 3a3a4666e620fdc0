use alloy::primitives::{utils::format_ether, U256};

use crate::{
    source::{parse_record, AddressCycle},
    transfer::{TransferError, TransferExecutor, TransferReport},
};

#[derive(Debug)]
pub enum RowOutcome {
    Transferred(TransferReport),
    Failed(TransferError),
    /// The balance recorded in the file is not positive.
    Skipped,
    Malformed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub transferred: usize,
    pub failed: usize,
    /// Failures where the receipt never arrived, also counted in `failed`.
    pub timed_out: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub total_transfer_fee: U256,
}

impl RunSummary {
    fn record(&mut self, outcome: &RowOutcome) {
        self.rows += 1;
        match outcome {
            RowOutcome::Transferred(report) => {
                self.transferred += 1;
                self.total_transfer_fee += report.fees.transfer_fee;
            }
            RowOutcome::Failed(e) => {
                self.failed += 1;
                if matches!(e, TransferError::Timeout(_)) {
                    self.timed_out += 1;
                }
            }
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::Malformed => self.malformed += 1,
        }
    }
}

/// Walks the address file one row at a time, one transfer in flight at most.
pub struct Driver<E> {
    source: AddressCycle,
    executor: E,
}

impl<E: TransferExecutor> Driver<E> {
    pub fn new(source: AddressCycle, executor: E) -> Self {
        Self { source, executor }
    }

    /// Only the balance recorded in the file decides eligibility.
    pub async fn process_row(&self, row: &str) -> RowOutcome {
        let record = match parse_record(row) {
            Ok(record) => record,
            // Bad rows are skipped rather than ending the run.
            Err(e) => {
                tracing::warn!("Skipping malformed row: {e}");
                return RowOutcome::Malformed;
            }
        };

        if !record.is_funded() {
            tracing::info!(
                "Balance for address {} is 0, skipping transfer.",
                record.address
            );
            return RowOutcome::Skipped;
        }

        match self.executor.attempt_transfer(record.address).await {
            Ok(report) => RowOutcome::Transferred(report),
            Err(e) => RowOutcome::Failed(e),
        }
    }

    /// Processes `max_rows` rows, or runs forever when `None`.
    /// Returns early only if the source has no rows at all.
    pub async fn run(&mut self, max_rows: Option<usize>) -> RunSummary {
        let mut summary = RunSummary::default();

        while max_rows.map_or(true, |max_rows| summary.rows < max_rows) {
            let Some(row) = self.source.next_row().map(str::to_owned) else {
                tracing::warn!("Address file has no data rows, nothing to do");
                break;
            };

            let outcome = self.process_row(&row).await;
            summary.record(&outcome);
        }

        tracing::info!(
            "Processed {} rows: {} transferred, {} failed ({} timed out), {} skipped, {} malformed. Spent {} ETH",
            summary.rows,
            summary.transferred,
            summary.failed,
            summary.timed_out,
            summary.skipped,
            summary.malformed,
            format_ether(summary.total_transfer_fee)
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use alloy::primitives::{address, Address, TxHash};

    use super::*;
    use crate::{test_utils::capture_logs, transfer::calculate_fees};

    const UNFUNDED: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const FUNDED: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

    #[derive(Default, Clone)]
    struct RecordingExecutor {
        calls: Rc<RefCell<Vec<Address>>>,
        fail: bool,
    }

    impl TransferExecutor for RecordingExecutor {
        async fn attempt_transfer(
            &self,
            recipient: Address,
        ) -> Result<TransferReport, TransferError> {
            self.calls.borrow_mut().push(recipient);

            if self.fail {
                return Err(TransferError::Other(eyre::eyre!("insufficient funds")));
            }

            Ok(TransferReport {
                recipient,
                tx_hash: TxHash::ZERO,
                gas_used: 21_000,
                fees: calculate_fees(21_000, 1, U256::from(10)),
                success: true,
            })
        }
    }

    fn driver(file: &str, executor: RecordingExecutor) -> Driver<RecordingExecutor> {
        Driver::new(AddressCycle::from_reader(file.as_bytes()).unwrap(), executor)
    }

    const TWO_ROWS: &str = "address;balance\n\
        0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA;0\n\
        0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb;1.5\n";

    #[tokio::test]
    async fn one_pass_skips_unfunded_and_transfers_funded() {
        let executor = RecordingExecutor::default();
        let mut driver = driver(TWO_ROWS, executor.clone());

        let summary = driver.run(Some(2)).await;

        assert_eq!(*executor.calls.borrow(), vec![FUNDED]);
        assert_eq!(
            summary,
            RunSummary {
                rows: 2,
                transferred: 1,
                skipped: 1,
                total_transfer_fee: U256::from(21_010),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn skip_message_names_the_address() {
        let executor = RecordingExecutor::default();
        let driver = driver(TWO_ROWS, executor.clone());
        let (logs, _guard) = capture_logs();

        let outcome = driver
            .process_row("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA;0")
            .await;

        assert!(matches!(outcome, RowOutcome::Skipped));
        assert!(executor.calls.borrow().is_empty());

        let logs = logs.contents();
        assert!(logs.contains("skipping transfer"));
        assert!(logs.contains(&UNFUNDED.to_string()));
        assert!(logs
            .to_lowercase()
            .contains("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
    }

    #[tokio::test]
    async fn funded_rows_are_attempted_once_per_pass() {
        let executor = RecordingExecutor::default();
        let mut driver = driver(TWO_ROWS, executor.clone());

        let summary = driver.run(Some(6)).await;

        assert_eq!(*executor.calls.borrow(), vec![FUNDED; 3]);
        assert_eq!(summary.skipped, 3);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_loop() {
        let executor = RecordingExecutor {
            fail: true,
            ..Default::default()
        };
        let mut driver = driver(TWO_ROWS, executor.clone());

        let summary = driver.run(Some(4)).await;

        assert_eq!(executor.calls.borrow().len(), 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.timed_out, 0);
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.total_transfer_fee, U256::ZERO);
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped() {
        let executor = RecordingExecutor::default();
        let mut driver = driver(
            "address;balance\n\
            not-an-address;5\n\
            0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb;many\n\
            0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb;2\n",
            executor.clone(),
        );

        let (logs, _guard) = capture_logs();

        let summary = driver.run(Some(3)).await;

        assert_eq!(summary.malformed, 2);
        assert!(logs.contents().contains("Skipping malformed row"));
        assert_eq!(*executor.calls.borrow(), vec![FUNDED]);
    }

    #[tokio::test]
    async fn negative_balance_is_skipped() {
        let executor = RecordingExecutor::default();
        let mut driver = driver(
            "address;balance\n0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb;-1\n",
            executor.clone(),
        );

        let summary = driver.run(Some(1)).await;

        assert_eq!(summary.skipped, 1);
        assert!(executor.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn stops_on_empty_source() {
        let executor = RecordingExecutor::default();
        let mut driver = driver("address;balance\n", executor.clone());

        let summary = driver.run(None).await;

        assert_eq!(summary, RunSummary::default());
    }
}

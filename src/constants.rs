// FILES
pub const CONFIG_FILE_PATH: &str = "data/config.toml";
pub const LOG_DIRECTORY: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "dust-sender.log";

// ENV
pub const SENDER_PRIVATE_KEY_ENV: &str = "SENDER_PRIVATE_KEY";
pub const SENDER_ADDRESS_ENV: &str = "SENDER_ADDRESS";

// 10 wei
pub const DEFAULT_TRANSFER_AMOUNT: &str = "0.00000000000000001";
pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 100;

// RetryBackoffLayer: max rate limit retries, initial backoff (ms), compute units per second
pub const RPC_MAX_RETRIES: u32 = 10;
pub const RPC_INITIAL_BACKOFF_MS: u64 = 2;
pub const RPC_COMPUTE_UNITS_PER_SECOND: u64 = 500;

pub const BALANCE_DELIMITER: char = ';';

use distrib_common::{
    distribution::Amount,
    utils::detect_available_parallelism,
};
use lazy_static::lazy_static;

// Default directory of the database
pub const DEFAULT_DIR_PATH: &str = "distrib_data/";

// Default log file name
pub const DEFAULT_LOG_FILENAME: &str = "distrib_daemon.log";

// Default logs directory
pub const DEFAULT_LOGS_PATH: &str = "logs/";

// Conditional balance writes retried inside one transaction
pub const MAX_BALANCE_WRITE_ATTEMPTS: usize = 3;

// Whole transactions retried after a commit conflict
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: usize = 3;

// Default minimum withdrawal amount (no minimum)
pub const DEFAULT_MIN_WITHDRAWAL_AMOUNT: Amount = 0;

// Sequence keys in the common column
pub const NEXT_DISTRIBUTOR_ID_KEY: &[u8] = b"NEXT_DISTRIBUTOR_ID";
pub const NEXT_WITHDRAWAL_ID_KEY: &[u8] = b"NEXT_WITHDRAWAL_ID";

lazy_static! {
    // Default RocksDB block cache size, scaled down on small machines
    pub static ref DEFAULT_DB_CACHE_SIZE: usize =
        detect_available_parallelism().min(8) * 16 * 1024 * 1024;
}

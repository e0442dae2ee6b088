use distrib_common::{
    distribution::{Amount, DistributorStatus},
    logger::{default_logs_datetime_format, LogLevel},
    utils::detect_available_parallelism,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::{
        DEFAULT_DB_CACHE_SIZE, DEFAULT_DIR_PATH, DEFAULT_LOGS_PATH, DEFAULT_LOG_FILENAME,
        DEFAULT_MAX_COMMIT_ATTEMPTS, DEFAULT_MIN_WITHDRAWAL_AMOUNT,
    },
    core::storage::rocksdb::{CacheMode, CompressionMode},
};

// Functions Helpers
fn default_dir_path() -> String {
    DEFAULT_DIR_PATH.to_owned()
}

fn default_log_filename() -> String {
    DEFAULT_LOG_FILENAME.to_owned()
}

fn default_logs_path() -> String {
    DEFAULT_LOGS_PATH.to_owned()
}

fn default_max_open_files() -> i32 {
    1024
}

fn default_keep_max_log_files() -> usize {
    4
}

fn default_db_cache_size() -> usize {
    *DEFAULT_DB_CACHE_SIZE
}

fn default_write_buffer_size() -> usize {
    64 * 1024 * 1024
}

fn default_max_commit_attempts() -> usize {
    DEFAULT_MAX_COMMIT_ATTEMPTS
}

fn default_auto_enroll_status() -> DistributorStatus {
    DistributorStatus::Active
}

fn default_min_withdrawal_amount() -> Amount {
    DEFAULT_MIN_WITHDRAWAL_AMOUNT
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Set the number of background threads used by RocksDB
    #[clap(long = "rocksdb-parallelism", default_value_t = detect_available_parallelism())]
    #[serde(default = "detect_available_parallelism")]
    pub parallelism: usize,
    /// Set the max number of concurrent background jobs
    #[clap(long = "rocksdb-max-background-jobs", default_value_t = detect_available_parallelism())]
    #[serde(default = "detect_available_parallelism")]
    pub max_background_jobs: usize,
    /// Set the max number of threads used by a compaction job
    #[clap(long = "rocksdb-max-subcompaction-jobs", default_value_t = detect_available_parallelism())]
    #[serde(default = "detect_available_parallelism")]
    pub max_subcompaction_jobs: usize,
    /// Set the number of low priority background threads
    #[clap(long = "rocksdb-low-priority-background-threads", default_value_t = detect_available_parallelism())]
    #[serde(default = "detect_available_parallelism")]
    pub low_priority_background_threads: usize,
    /// Max number of files kept open by RocksDB, -1 means unlimited
    #[clap(long = "rocksdb-max-open-files", default_value_t = default_max_open_files())]
    #[serde(default = "default_max_open_files")]
    pub max_open_files: i32,
    /// Max number of info log files kept
    #[clap(long = "rocksdb-keep-max-log-files", default_value_t = default_keep_max_log_files())]
    #[serde(default = "default_keep_max_log_files")]
    pub keep_max_log_files: usize,
    /// Compression applied to the column families
    #[clap(long = "rocksdb-compression-mode", value_enum, default_value_t)]
    #[serde(default)]
    pub compression_mode: CompressionMode,
    /// Block cache kind
    #[clap(long = "rocksdb-cache-mode", value_enum, default_value_t)]
    #[serde(default)]
    pub cache_mode: CacheMode,
    /// Block cache size in bytes
    #[clap(long = "rocksdb-cache-size", default_value_t = default_db_cache_size())]
    #[serde(default = "default_db_cache_size")]
    pub cache_size: usize,
    /// Write buffer size in bytes
    #[clap(long = "rocksdb-write-buffer-size", default_value_t = default_write_buffer_size())]
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,
    /// Share the write buffer size across all column families
    #[clap(long = "rocksdb-write-buffer-shared")]
    #[serde(default)]
    pub write_buffer_shared: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            parallelism: detect_available_parallelism(),
            max_background_jobs: detect_available_parallelism(),
            max_subcompaction_jobs: detect_available_parallelism(),
            low_priority_background_threads: detect_available_parallelism(),
            max_open_files: default_max_open_files(),
            keep_max_log_files: default_keep_max_log_files(),
            compression_mode: CompressionMode::default(),
            cache_mode: CacheMode::default(),
            cache_size: default_db_cache_size(),
            write_buffer_size: default_write_buffer_size(),
            write_buffer_shared: false,
        }
    }
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many times a whole operation is run again after a commit conflict
    #[clap(long, default_value_t = default_max_commit_attempts())]
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: usize,
    /// Status given to users promoted after a qualifying paid order
    #[clap(long, value_enum, default_value_t = default_auto_enroll_status())]
    #[serde(default = "default_auto_enroll_status")]
    pub auto_enroll_status: DistributorStatus,
    /// Only promote purchasers referred by an active distributor
    #[clap(long)]
    #[serde(default)]
    pub auto_enroll_requires_referrer: bool,
    /// Minimum withdrawal amount, in atomic units
    #[clap(long, default_value_t = default_min_withdrawal_amount())]
    #[serde(default = "default_min_withdrawal_amount")]
    pub min_withdrawal_amount: Amount,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: default_max_commit_attempts(),
            auto_enroll_status: default_auto_enroll_status(),
            auto_enroll_requires_referrer: false,
            min_withdrawal_amount: default_min_withdrawal_amount(),
        }
    }
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct LogConfig {
    /// Set log level
    #[clap(long, value_enum, default_value_t)]
    #[serde(default)]
    pub log_level: LogLevel,
    /// Set file log level
    /// By default, it will be the same as log level
    #[clap(long, value_enum)]
    pub file_log_level: Option<LogLevel>,
    /// Disable the log file
    #[clap(long)]
    #[serde(default)]
    pub disable_file_logging: bool,
    /// Disable the log filename date based
    /// If disabled, the log file will be named distrib_daemon.log instead of YYYY-MM-DD.distrib_daemon.log
    #[clap(long)]
    #[serde(default)]
    pub disable_file_log_date_based: bool,
    /// Disable the usage of colors in log
    #[clap(long)]
    #[serde(default)]
    pub disable_log_color: bool,
    /// Log filename
    ///
    /// File will be stored in logs directory, this is only the filename, not the full path.
    #[clap(long, default_value_t = default_log_filename())]
    #[serde(default = "default_log_filename")]
    pub filename_log: String,
    /// Logs directory
    ///
    /// By default it will be logs/ of the current directory.
    /// It must end with a / to be a valid folder.
    #[clap(long, default_value_t = default_logs_path())]
    #[serde(default = "default_logs_path")]
    pub logs_path: String,
    /// Change the datetime format used by the logger
    #[clap(long, default_value_t = default_logs_datetime_format())]
    #[serde(default = "default_logs_datetime_format")]
    pub datetime_format: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct Config {
    /// RocksDB configuration
    #[clap(flatten)]
    pub rocksdb: RocksDBConfig,
    /// Engine configuration
    #[clap(flatten)]
    pub engine: EngineConfig,
    /// Log configuration
    #[clap(flatten)]
    pub log: LogConfig,
    /// Set the path to use for the database
    /// It must end with a / to be a valid folder.
    #[clap(long, default_value_t = default_dir_path())]
    #[serde(default = "default_dir_path")]
    pub dir_path: String,
    /// JSON file to load the configuration from
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub config_file: Option<String>,
    /// Generate the template at the `config_file` path
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub generate_config_template: bool,
}
